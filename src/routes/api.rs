use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// API Router Module
///
/// Nested under `/api`. The catch-all matcher excludes these paths from the
/// gate, so handlers decide authentication themselves via `CurrentUser`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // GET /api/health
        .route("/health", get(handlers::health))
        // GET /api/session
        .route("/session", get(handlers::get_session))
}
