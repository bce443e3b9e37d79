//! API layer
//!
//! HTTP handlers for:
//! - Session reader (`/me`)
//! - Metrics (Prometheus)

mod me;
pub mod metrics;

pub use me::me_router;
pub use metrics::metrics_router;
