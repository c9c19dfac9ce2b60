use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Sign-in Router Module
///
/// The OAuth authorization-code flow and logout. These paths are gated but
/// neither private nor login pages, so the gate always lets them through.
pub fn sign_in_routes() -> Router<AppState> {
    Router::new()
        // GET /auth/{provider}
        // Stores a CSRF state cookie and redirects to the provider.
        .route("/auth/{provider}", get(handlers::oauth_start))
        // GET /auth/{provider}/callback
        // Exchanges the code, links the account and sets the session cookie.
        .route("/auth/{provider}/callback", get(handlers::oauth_callback))
        // GET|POST /logout
        .route("/logout", get(handlers::logout).post(handlers::logout))
}
