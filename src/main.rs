use session_gate::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, Repository, RepositoryState},
    store::StoreHandle,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, the lazily connected store, and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // `.env` is loaded before the environment is read.
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet: its format depends on the configuration.
            eprintln!("FATAL: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // 2. Logging Filter Setup
    // RUST_LOG takes priority, falling back to development-friendly defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "session_gate=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    // The output format is selected by APP_ENV.
    match config.env {
        Env::Local => {
            // LOCAL: pretty output for human readability while debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for centralized log aggregation.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Handle (Postgres)
    // The pool connects on first use; locally we force that now so the
    // schema exists before the first sign-in.
    let store = Arc::new(StoreHandle::new(config.db_url.clone()));
    // Instantiate the Repository, wrapping it in an Arc for thread-safe sharing.
    let repo = Arc::new(PostgresRepository::new(store.clone())) as RepositoryState;

    // LOCAL-ONLY: create the tables if they are missing.
    if config.env == Env::Local {
        if let Err(e) = repo.ensure_schema().await {
            tracing::error!(error = %e, "FATAL: could not prepare the database schema. Check DATABASE_URL.");
            std::process::exit(1);
        }
    }

    // 5. Unified State Assembly
    // Bundles the repository, session resolver, route policy and providers into AppState.
    let bind_addr = config.bind_addr.clone();
    let app_state = match AppState::new(config, repo) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "FATAL: invalid route configuration");
            std::process::exit(1);
        }
    };

    if app_state.providers.is_empty() {
        tracing::warn!("No OAuth provider configured; sign-in is only possible through the local x-user-id bypass");
    }

    tracing::info!(
        login = app_state.policy.login_path(),
        home = app_state.policy.app_home(),
        private = ?app_state.policy.private_prefixes(),
        "Route gate configured"
    );

    // 6. Router and Server Startup
    let app = create_router(app_state);

    // Binds the TCP listener before serving.
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "FATAL: could not bind listener");
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API documentation available at /swagger-ui");

    // The long-running Axum server process, stopped by Ctrl-C.
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
    }

    // 7. Shutdown: release database connections if any were opened.
    if store.is_connected() {
        if let Ok(pool) = store.pool().await {
            pool.close().await;
        }
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        // Without a signal handler, run until killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
