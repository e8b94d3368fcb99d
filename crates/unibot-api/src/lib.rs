//! UniBot API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat engine over a small JSON API: session creation and
//! activation, message handling, session listing and health checks.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
