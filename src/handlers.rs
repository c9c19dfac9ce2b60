use crate::{
    AppState,
    auth::{self, CurrentUser},
    config::Env,
    error::{AppError, ErrorBody},
    models::{SessionResponse, User},
    oauth::{self, STATE_COOKIE, STATE_TTL_SECS},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use html_escape::encode_text;
use serde::Deserialize;
use uuid::Uuid;

// --- Pages ---

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
{body}
</body>
</html>"#,
        title = encode_text(title),
    ))
}

fn display_name(user: &User) -> String {
    let name = user
        .name
        .as_deref()
        .or(user.email.as_deref())
        .unwrap_or("there");
    encode_text(name).into_owned()
}

/// home_page
///
/// [Public Route] Landing page.
pub async fn home_page(State(state): State<AppState>) -> Html<String> {
    page(
        "Home",
        &format!(
            r#"<h1>Welcome</h1>
<p><a href="{home}">Open the dashboard</a> or <a href="{login}">sign in</a>.</p>"#,
            home = state.policy.app_home(),
            login = state.policy.login_path(),
        ),
    )
}

/// login_page
///
/// [Login Route] Lists the configured identity providers. Signed-in users
/// never see it: the gate sends them to the app home first.
pub async fn login_page(State(state): State<AppState>) -> Html<String> {
    let buttons = if state.providers.is_empty() {
        "<p>No sign-in provider is configured.</p>".to_string()
    } else {
        state
            .providers
            .iter()
            .map(|p| {
                format!(
                    r#"<p><a href="/auth/{}">Sign in with {}</a></p>"#,
                    p.id(),
                    p.kind.display_name()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    page("Sign in", &format!("<h1>Sign in</h1>\n{buttons}"))
}

/// dashboard_page
///
/// [Private Route] Reached only with a valid session.
pub async fn dashboard_page(CurrentUser(user): CurrentUser) -> Html<String> {
    page(
        "Dashboard",
        &format!(
            r#"<h1>Dashboard</h1>
<p>Hello, {name}.</p>
<p><a href="/profile">Profile</a> | <a href="/dashboard/settings">Settings</a></p>
<form method="post" action="/logout"><button type="submit">Sign out</button></form>"#,
            name = display_name(&user),
        ),
    )
}

pub async fn settings_page(CurrentUser(user): CurrentUser) -> Html<String> {
    page(
        "Settings",
        &format!(
            "<h1>Settings</h1>\n<p>Signed in as {}.</p>",
            display_name(&user)
        ),
    )
}

/// profile_page
///
/// [Private Route] The signed-in user's stored profile.
pub async fn profile_page(CurrentUser(user): CurrentUser) -> Html<String> {
    let email = user
        .email
        .as_deref()
        .map(|email| encode_text(email).into_owned())
        .unwrap_or_default();
    let image = user
        .image
        .as_deref()
        .map(|src| {
            format!(
                r#"<img src="{}" alt="avatar" width="64">"#,
                html_escape::encode_double_quoted_attribute(src)
            )
        })
        .unwrap_or_default();

    page(
        "Profile",
        &format!(
            "<h1>{name}</h1>\n{image}\n<p>{email}</p>\n<p>Member since {since}</p>",
            name = display_name(&user),
            since = user.created_at.format("%Y-%m-%d"),
        ),
    )
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, page("Not found", "<h1>Not found</h1>"))
}

// --- OAuth Sign-in ---

/// oauth_start
///
/// [Sign-in Route] GET /auth/{provider}
/// 1. Generates a CSRF state token and stores it in a short-lived cookie.
/// 2. Redirects to the provider's authorize URL.
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let provider = state.providers.get(&provider_id).ok_or(AppError::NotFound)?;

    let csrf_state = Uuid::new_v4().simple().to_string();
    let redirect_uri = oauth::callback_uri(&state.config.public_url, provider);
    let target = provider.authorize_redirect(&redirect_uri, &csrf_state)?;

    let cookie = Cookie::build((STATE_COOKIE, csrf_state))
        .path("/auth")
        .http_only(true)
        .secure(state.config.env == Env::Production)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(STATE_TTL_SECS))
        .build();

    tracing::debug!(provider = provider.id(), "Redirecting to identity provider");
    Ok((jar.add(cookie), Redirect::to(target.as_str())))
}

/// Query parameters of the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied access.
    pub error: Option<String>,
}

/// oauth_callback
///
/// [Sign-in Route] GET /auth/{provider}/callback
/// 1. Verifies the CSRF state against the cookie.
/// 2. Exchanges the code for an access token.
/// 3. Fetches the profile and finds or creates the local user.
/// 4. Issues the session cookie and redirects to the app home.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let provider = state.providers.get(&provider_id).ok_or(AppError::NotFound)?;

    if let Some(error) = query.error {
        return Err(AppError::BadRequest(format!("sign-in was not completed: {error}")));
    }

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_owned());
    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => return Err(AppError::BadRequest("OAuth state mismatch".to_string())),
    }

    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    let redirect_uri = oauth::callback_uri(&state.config.public_url, provider);
    let token = provider
        .exchange_code(&state.http, &code, &redirect_uri)
        .await?;
    let profile = provider
        .fetch_profile(&state.http, &token.access_token)
        .await?;

    let user = oauth::complete_sign_in(state.repo.as_ref(), provider.id(), profile, token).await?;

    let session = auth::issue_session_token(
        &user,
        &state.config.session_secret,
        state.config.session_ttl_secs,
    )?;
    tracing::info!(user_id = %user.id, provider = provider.id(), "User signed in");

    let jar = jar
        .remove(Cookie::build(STATE_COOKIE).path("/auth").build())
        .add(auth::session_cookie(
            session,
            state.config.session_ttl_secs,
            state.config.env == Env::Production,
        ));

    Ok((jar, Redirect::to(state.policy.app_home())))
}

/// logout
///
/// [Sign-in Route] GET|POST /logout: drops the session cookie and returns to the login page.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    (
        jar.remove(auth::session_cookie_removal()),
        Redirect::to(state.policy.login_path()),
    )
}

// --- API ---

/// health
///
/// [API Route] Liveness probe. Never gated.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// get_session
///
/// [API Route] The current session's user. APIs are excluded from the gate,
/// so a missing session is answered with 401 instead of a redirect.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Signed-in user", body = SessionResponse),
        (status = 401, description = "No valid session", body = ErrorBody)
    )
)]
pub async fn get_session(CurrentUser(user): CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse { user: user.into() })
}
