//! OAuth 2.0 authorization-code sign-in.
//!
//! Token exchange and profile retrieval are delegated to the providers'
//! HTTP endpoints through `reqwest`; this module only builds the requests,
//! normalizes the profile and links it to a local user.

use reqwest::{Client, Url, header};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::{AppConfig, ProviderCredentials},
    error::AppError,
    models::{Account, NewUser, User},
    repository::Repository,
};

/// Cookie holding the CSRF `state` between the redirect and the callback.
pub const STATE_COOKIE: &str = "oauth_state";

/// How long a sign-in attempt may take before its state cookie expires.
pub const STATE_TTL_SECS: i64 = 10 * 60;

/// ProviderKind
///
/// Supported identity providers. Each knows how to read its own profile payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    Google,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Google => "google",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GitHub",
            ProviderKind::Google => "Google",
        }
    }

    /// parse_profile
    ///
    /// Normalizes the provider's userinfo payload. GitHub reports a numeric
    /// `id` and `avatar_url`; Google (OIDC userinfo) a string `sub` and `picture`.
    pub fn parse_profile(&self, value: &Value) -> Option<ProviderProfile> {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        match self {
            ProviderKind::GitHub => {
                let id = value.get("id")?;
                let provider_account_id = match id {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => return None,
                };
                Some(ProviderProfile {
                    provider_account_id,
                    // Users without a display name fall back to their login.
                    name: text("name").or_else(|| text("login")),
                    email: text("email"),
                    image: text("avatar_url"),
                })
            }
            ProviderKind::Google => Some(ProviderProfile {
                provider_account_id: text("sub")?,
                name: text("name"),
                email: text("email"),
                image: text("picture"),
            }),
        }
    }
}

/// A provider's identity for the signing-in user, independent of provider format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_account_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Access token returned by the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// OAuthProvider
///
/// One configured identity provider: endpoints, scope and client credentials.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub kind: ProviderKind,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scope: String,
    pub credentials: ProviderCredentials,
}

impl OAuthProvider {
    pub fn github(credentials: ProviderCredentials) -> Self {
        Self {
            kind: ProviderKind::GitHub,
            authorize_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            scope: "read:user user:email".to_string(),
            credentials,
        }
    }

    pub fn google(credentials: ProviderCredentials) -> Self {
        Self {
            kind: ProviderKind::Google,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            scope: "openid email profile".to_string(),
            credentials,
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    /// authorize_redirect
    ///
    /// The provider URL the browser is sent to, carrying the client id, the
    /// callback URI, the requested scope and the CSRF `state`.
    pub fn authorize_redirect(&self, redirect_uri: &str, state: &str) -> Result<Url, AppError> {
        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", self.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Provider(format!("invalid authorize url: {e}")))
    }

    /// exchange_code
    ///
    /// Trades the authorization code for an access token (form POST, JSON answer).
    pub async fn exchange_code(
        &self,
        http: &Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = http
            .post(&self.token_url)
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "{} token endpoint answered {}",
                self.id(),
                response.status()
            )));
        }

        // GitHub reports failures as 200 with an `error` body, which fails to parse here.
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::Provider(format!("{} token response: {e}", self.id())))
    }

    /// fetch_profile
    ///
    /// Reads the signed-in identity from the provider's userinfo endpoint.
    pub async fn fetch_profile(
        &self,
        http: &Client,
        access_token: &str,
    ) -> Result<ProviderProfile, AppError> {
        let response = http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            // GitHub's API rejects requests without a User-Agent.
            .header(header::USER_AGENT, env!("CARGO_PKG_NAME"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "{} userinfo endpoint answered {}",
                self.id(),
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        self.kind
            .parse_profile(&body)
            .ok_or_else(|| AppError::Provider(format!("{} profile is missing an id", self.id())))
    }
}

/// ProviderRegistry
///
/// The providers enabled by configuration, looked up by id from the route path.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<OAuthProvider>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<OAuthProvider>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let providers = config
            .github
            .clone()
            .map(OAuthProvider::github)
            .into_iter()
            .chain(config.google.clone().map(OAuthProvider::google))
            .collect();
        Self { providers }
    }

    pub fn get(&self, id: &str) -> Option<&OAuthProvider> {
        self.providers.iter().find(|p| p.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OAuthProvider> {
        self.providers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// The callback URI registered with each provider: `{public_url}/auth/{id}/callback`.
pub fn callback_uri(public_url: &str, provider: &OAuthProvider) -> String {
    format!(
        "{}/auth/{}/callback",
        public_url.trim_end_matches('/'),
        provider.id()
    )
}

/// complete_sign_in
///
/// Finds the user linked to `profile` at `provider`, creating one on first
/// sign-in, and stores the fresh token on the account link. Accounts are
/// never merged by email: the same address at two providers yields two users.
pub async fn complete_sign_in(
    repo: &dyn Repository,
    provider: &str,
    profile: ProviderProfile,
    token: TokenResponse,
) -> Result<User, AppError> {
    let user = match repo
        .find_user_by_account(provider, &profile.provider_account_id)
        .await?
    {
        Some(user) => user,
        None => {
            let user = repo
                .create_user(NewUser {
                    name: profile.name,
                    email: profile.email,
                    image: profile.image,
                })
                .await?;
            tracing::info!(user_id = %user.id, provider, "Created user on first sign-in");
            user
        }
    };

    repo.link_account(Account {
        provider: provider.to_string(),
        provider_account_id: profile.provider_account_id,
        user_id: user.id,
        access_token: Some(token.access_token),
        token_type: token.token_type,
        scope: token.scope,
    })
    .await?;

    Ok(user)
}
