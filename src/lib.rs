use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod repository;
pub mod store;

pub mod routes;
use routes::{api, private, public, sign_in};

// --- Public Re-exports ---

pub use auth::{SessionResolver, SessionState, TokenSessionResolver};
pub use config::AppConfig;
pub use gate::{AuthVerdict, GateDecision, RoutePolicy};
pub use oauth::ProviderRegistry;
pub use repository::{PostgresRepository, RepositoryState};
pub use store::StoreHandle;

/// ApiDoc
///
/// OpenAPI document for the JSON API, served at `/api-docs/openapi.json`.
/// HTML pages and the OAuth redirects are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::health, handlers::get_session),
    components(schemas(models::SessionResponse, models::SessionUser, error::ErrorBody)),
    tags((name = "session-gate", description = "Session API"))
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Persistence, backed by the lazily connected store handle.
    pub repo: RepositoryState,
    /// Turns request headers into an `AuthVerdict`.
    pub sessions: SessionState,
    /// Route classification evaluated by the gate.
    pub policy: Arc<RoutePolicy>,
    /// Identity providers enabled by configuration.
    pub providers: Arc<ProviderRegistry>,
    /// Shared HTTP client for provider token and userinfo calls.
    pub http: reqwest::Client,
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Wires the production collaborators around an existing repository. Fails
    /// when the configured routes do not form a valid policy.
    pub fn new(config: AppConfig, repo: RepositoryState) -> Result<Self, gate::PolicyError> {
        let policy = Arc::new(config.route_policy()?);
        let sessions = Arc::new(TokenSessionResolver::new(repo.clone(), &config)) as SessionState;
        let providers = Arc::new(ProviderRegistry::from_config(&config));

        Ok(Self {
            repo,
            sessions,
            policy,
            providers,
            http: reqwest::Client::new(),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// route_gate
///
/// Middleware running the per-request pipeline:
/// 1. Matcher: API routes and static assets skip everything below.
/// 2. Session resolution into an `AuthVerdict`.
/// 3. The route-access gate.
///
/// `Allow` forwards the request with the verdict attached as an extension
/// (picked up by `CurrentUser`); `RedirectTo` answers 307 without running the handler.
async fn route_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if !gate::is_gated(&path) {
        return next.run(request).await;
    }

    let verdict = state.sessions.resolve(request.headers()).await;

    match state.policy.decide(&verdict, &path) {
        GateDecision::Allow => {
            request.extensions_mut().insert(verdict);
            next.run(request).await
        }
        GateDecision::RedirectTo(target) => {
            tracing::debug!(
                path = %path,
                authenticated = verdict.is_authenticated(),
                target = %target,
                "gate redirect"
            );
            Redirect::temporary(&target).into_response()
        }
    }
}

/// create_router
///
/// Assembles the routes, the gate middleware, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // 2. Request ID header shared by the generation and propagation layers.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 3. Route groups and the gate
    let base_router = Router::new()
        // 3a. Documentation: Swagger UI and the OpenAPI document, excluded from the gate by the matcher.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // 3b. Public pages: landing page and the configured login page.
        .merge(public::public_routes(state.policy.login_path()))
        // 3c. Private pages under the default private prefixes.
        .merge(private::private_routes())
        // 3d. OAuth redirect, callback and logout.
        .merge(sign_in::sign_in_routes())
        // 3e. JSON API under '/api'. Never redirected; answers 401 instead.
        .nest("/api", api::api_routes())
        .fallback(handlers::not_found)
        // 3f. The gate wraps every route, including the fallback, so unknown
        // private paths redirect just like known ones.
        .layer(middleware::from_fn_with_state(state.clone(), route_gate))
        // Apply the unified state to all routes.
        .with_state(state);

    // 4. Observability and Correlation Layers (applied outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a fresh UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: one span per request, carrying the generated ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: echoes x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS (outermost layer).
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`, correlating every log line of a request through its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
