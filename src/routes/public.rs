use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Pages any visitor may open. The login page is public too, but the gate
/// redirects signed-in users away from it to the app home.
pub fn public_routes(login_path: &str) -> Router<AppState> {
    Router::new()
        // GET /
        .route("/", get(handlers::home_page))
        // GET /login (or the configured LOGIN_PATH)
        // Never `/`: a root login path would cover the app home, which the policy rejects.
        .route(login_path, get(handlers::login_page))
}
