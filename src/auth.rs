use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    gate::AuthVerdict,
    models::User,
    repository::RepositoryState,
};

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "session";

/// Header accepted as a sign-in shortcut when running locally.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the signed session token issued after a successful OAuth sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the `users.id` of the signed-in user.
    pub sub: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    /// Expiration time (seconds since epoch); enforced on every decode.
    pub exp: i64,
    pub iat: i64,
}

/// issue_session_token
///
/// Signs a session for `user`, valid for `ttl_secs` seconds (HS256).
/// Fails instead of wrapping when the expiry does not fit an `i64`.
pub fn issue_session_token(user: &User, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let exp = now
        .checked_add(ttl_secs)
        .ok_or(AppError::SessionLifetime(ttl_secs))?;
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        image: user.image.clone(),
        iat: now,
        exp,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// decode_session_token
///
/// Verifies signature and expiry, returning the claims.
pub fn decode_session_token(
    token: &str,
    secret: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Builds the HttpOnly session cookie set after sign-in.
pub fn session_cookie(token: String, ttl_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl_secs))
        .build()
}

/// Cookie value that removes the session cookie when passed to `CookieJar::remove`.
pub fn session_cookie_removal() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Session token from the `session` cookie, falling back to an `Authorization: Bearer` header.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(ToOwned::to_owned)
        })
}

// --- Session Resolution ---

/// SessionResolver
///
/// Turns the headers of one request into an `AuthVerdict`. Implementations
/// may suspend (database lookups) but never fail: anything short of a
/// verified, existing user is `Unauthenticated`.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> AuthVerdict;
}

/// SessionState
///
/// The shared resolver stored in `AppState`.
pub type SessionState = Arc<dyn SessionResolver>;

/// TokenSessionResolver
///
/// Production resolver. Steps:
/// 1. Local bypass: with `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. Token extraction from the session cookie or a Bearer header.
/// 3. Signature and expiry verification.
/// 4. Database lookup, so a deleted user loses access even with a live token.
pub struct TokenSessionResolver {
    repo: RepositoryState,
    secret: String,
    env: Env,
}

impl TokenSessionResolver {
    pub fn new(repo: RepositoryState, config: &AppConfig) -> Self {
        Self {
            repo,
            secret: config.session_secret.clone(),
            env: config.env,
        }
    }

    async fn user_exists(&self, id: Uuid) -> bool {
        match self.repo.get_user(id).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %id, "user lookup failed during session resolution");
                false
            }
        }
    }

    fn local_bypass_user(&self, headers: &HeaderMap) -> Option<Uuid> {
        if self.env != Env::Local {
            return None;
        }
        headers
            .get(LOCAL_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
    }
}

#[async_trait]
impl SessionResolver for TokenSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> AuthVerdict {
        if let Some(user_id) = self.local_bypass_user(headers) {
            if self.user_exists(user_id).await {
                return AuthVerdict::Authenticated { user_id };
            }
            // Unknown user: fall through to the regular token check.
        }

        let Some(token) = extract_session_token(headers) else {
            return AuthVerdict::Unauthenticated;
        };

        let claims = match decode_session_token(&token, &self.secret) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                return AuthVerdict::Unauthenticated;
            }
        };

        if self.user_exists(claims.sub).await {
            AuthVerdict::Authenticated {
                user_id: claims.sub,
            }
        } else {
            AuthVerdict::Unauthenticated
        }
    }
}

// --- Extractor ---

/// CurrentUser
///
/// The signed-in user, for handlers that need more than the id. Reuses the
/// verdict the gate middleware attached to the request, resolving the session
/// itself on routes the gate does not cover (the API).
///
/// Rejection: `AppError::Unauthorized` when there is no signed-in user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verdict = match parts.extensions.get::<AuthVerdict>() {
            Some(verdict) => *verdict,
            None => {
                let sessions = SessionState::from_ref(state);
                let verdict = sessions.resolve(&parts.headers).await;
                parts.extensions.insert(verdict);
                verdict
            }
        };

        let user_id = verdict.user_id().ok_or(AppError::Unauthorized)?;

        let repo = RepositoryState::from_ref(state);
        let user = repo
            .get_user(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser(user))
    }
}
