use thiserror::Error;
use uuid::Uuid;

/// AuthVerdict
///
/// The authentication outcome for a single request, as produced by a
/// `SessionResolver`. It lives for exactly one request and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    Authenticated { user_id: Uuid },
    Unauthenticated,
}

impl AuthVerdict {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthVerdict::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthVerdict::Authenticated { user_id } => Some(*user_id),
            AuthVerdict::Unauthenticated => None,
        }
    }
}

/// GateDecision
///
/// What the response layer must do with a gated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Pass the request through to the router unchanged.
    Allow,
    /// Answer with a redirect to the given path.
    RedirectTo(String),
}

/// Configuration combinations that would make the gate redirect a request
/// back onto the path it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("at least one login path must be configured")]
    NoLoginPath,
    #[error("route path `{0}` must start with `/`")]
    NotAbsolute(String),
    #[error("login path `{login}` is covered by private prefix `{prefix}`")]
    LoginIsPrivate { login: String, prefix: String },
    #[error("app home `{home}` is covered by login path `{login}`")]
    HomeIsLogin { home: String, login: String },
    #[error("login path `{0}` is excluded from the gate")]
    LoginNotGated(String),
    #[error("login path `{0}` is already served by a fixed route")]
    LoginIsReserved(String),
}

/// RoutePolicy
///
/// The immutable route classification used by the gate: which paths are
/// login pages, which path prefixes are private, and where an already
/// signed-in user lands. Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    login_paths: Vec<String>,
    private_prefixes: Vec<String>,
    app_home: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            login_paths: vec!["/login".to_string()],
            private_prefixes: vec!["/dashboard".to_string(), "/profile".to_string()],
            app_home: "/dashboard".to_string(),
        }
    }
}

impl RoutePolicy {
    /// new
    ///
    /// Validates and assembles a policy. The first login path is the redirect
    /// target for unauthenticated visitors of private routes.
    ///
    /// An empty `private_prefixes` list is accepted: nothing is private then.
    pub fn new(
        login_paths: Vec<String>,
        private_prefixes: Vec<String>,
        app_home: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        let app_home = app_home.into();

        if login_paths.is_empty() {
            return Err(PolicyError::NoLoginPath);
        }

        for path in login_paths
            .iter()
            .chain(private_prefixes.iter())
            .chain(std::iter::once(&app_home))
        {
            if !path.starts_with('/') {
                return Err(PolicyError::NotAbsolute(path.clone()));
            }
        }

        for login in &login_paths {
            if !is_gated(login) {
                return Err(PolicyError::LoginNotGated(login.clone()));
            }
            if is_reserved(login) {
                return Err(PolicyError::LoginIsReserved(login.clone()));
            }
            if let Some(prefix) = private_prefixes.iter().find(|p| login.starts_with(p.as_str())) {
                return Err(PolicyError::LoginIsPrivate {
                    login: login.clone(),
                    prefix: prefix.clone(),
                });
            }
        }

        if let Some(login) = login_paths.iter().find(|l| app_home.starts_with(l.as_str())) {
            return Err(PolicyError::HomeIsLogin {
                home: app_home,
                login: login.clone(),
            });
        }

        Ok(Self {
            login_paths,
            private_prefixes,
            app_home,
        })
    }

    /// The page unauthenticated visitors are sent to.
    pub fn login_path(&self) -> &str {
        // `new` guarantees at least one entry.
        &self.login_paths[0]
    }

    pub fn app_home(&self) -> &str {
        &self.app_home
    }

    pub fn private_prefixes(&self) -> &[String] {
        &self.private_prefixes
    }

    pub fn is_login(&self, path: &str) -> bool {
        self.login_paths.iter().any(|l| path.starts_with(l.as_str()))
    }

    pub fn is_private(&self, path: &str) -> bool {
        self.private_prefixes
            .iter()
            .any(|p| path.starts_with(p.as_str()))
    }

    /// decide
    ///
    /// The route-access gate. Rules are evaluated in order and the first match wins:
    /// 1. signed in and on a login page: go to the app home;
    /// 2. signed out and on a private route: go to the login page;
    /// 3. anything else is allowed.
    ///
    /// Pure and total: the same inputs always give the same decision.
    pub fn decide(&self, verdict: &AuthVerdict, path: &str) -> GateDecision {
        let signed_in = verdict.is_authenticated();

        if signed_in && self.is_login(path) {
            return GateDecision::RedirectTo(self.app_home.clone());
        }
        if !signed_in && self.is_private(path) {
            return GateDecision::RedirectTo(self.login_path().to_string());
        }
        GateDecision::Allow
    }
}

// --- Catch-all matcher ---

/// Path prefixes that never reach the gate: API routes, API documentation and asset folders.
const UNGATED_PREFIXES: &[&str] = &["/api", "/api-docs", "/swagger-ui", "/static", "/assets"];

/// Paths owned by the fixed page and sign-in routes.
const RESERVED_PATHS: &[&str] = &["/", "/dashboard", "/dashboard/settings", "/profile"];

/// Sign-in route trees; nothing below them can be a login page either.
const RESERVED_PREFIXES: &[&str] = &["/auth", "/logout"];

const UNGATED_FILES: &[&str] = &["/favicon.ico", "/robots.txt"];

const ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js", "map", "woff", "woff2",
];

/// is_gated
///
/// The catch-all matcher deciding which requests go through session
/// resolution and the gate at all. API routes and static assets are excluded.
pub fn is_gated(path: &str) -> bool {
    if UNGATED_FILES.contains(&path) {
        return false;
    }
    if UNGATED_PREFIXES
        .iter()
        .any(|prefix| has_segment_prefix(path, prefix))
    {
        return false;
    }
    !is_asset(path)
}

/// `/api` matches `/api` and `/api/me`, not `/apiary`.
fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn is_reserved(path: &str) -> bool {
    RESERVED_PATHS.contains(&path)
        || RESERVED_PREFIXES
            .iter()
            .any(|prefix| has_segment_prefix(path, prefix))
}

fn is_asset(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ASSET_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}
