use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Private Router Module
///
/// Pages living under the default private prefixes (`/dashboard`, `/profile`).
/// Each handler takes a `CurrentUser`, which reuses the verdict attached by the
/// gate; a session whose user has since been deleted is rejected with 401.
pub fn private_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /dashboard
        // The app home: where signed-in visitors of the login page are sent.
        .route("/dashboard", get(handlers::dashboard_page))
        // GET /dashboard/settings
        .route("/dashboard/settings", get(handlers::settings_page))
        // GET /profile
        .route("/profile", get(handlers::profile_page))
}
