//! HTTP API layer.
//!
//! REST surface over the read path and the dimension stores, with JWT auth,
//! per-IP rate limiting, Yandex OAuth, and the sync trigger that feeds the
//! queue.

pub mod credentials;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use response::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
