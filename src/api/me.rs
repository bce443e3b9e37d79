//! Session reader
//!
//! - GET /me

use axum::{Json, Router, routing::get};

use crate::AppState;
use crate::auth::{CurrentUser, Identity};

/// Create session reader router
pub fn me_router() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

/// GET /me
///
/// Returns the signed-in identity, or 401 without a live session.
async fn me(CurrentUser(session): CurrentUser) -> Json<Identity> {
    Json(session.identity)
}
