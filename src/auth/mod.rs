//! OpenID Connect authentication
//!
//! Handles:
//! - Login, callback and logout routes
//! - Pending login state
//! - Session management
//! - Session extractors

mod flow;
pub mod login_state;
mod middleware;
pub mod session;

pub use flow::auth_router;
pub use login_state::PendingLogin;
pub use middleware::CurrentUser;
pub use session::{Identity, Session, SessionStore, create_signed_token, verify_signed_token};
