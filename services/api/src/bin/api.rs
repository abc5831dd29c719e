//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MemoryCache, MemoryDb, MemorySessionStore, RedisAdapter},
    auth::PasswordService,
    config::{Backend, Config, LogMode},
    error::ApiError,
    web::{build_router, rest::ApiDoc, AppState},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use marketplace_core::{CacheService, DatabaseService, SessionStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    init_tracing(&config);
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Store & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.store {
        Backend::Memory => {
            warn!("STORE_DSN is memory://, data will not survive a restart");
            Arc::new(MemoryDb::new())
        }
        Backend::Url(url) => {
            info!("Connecting to database...");
            let adapter = DbAdapter::connect(url, config.store_max_connections).await?;
            info!("Running database migrations...");
            adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(adapter)
        }
    };

    // --- 3. Connect the Cache & Session Store ---
    let (cache, sessions): (Arc<dyn CacheService>, Arc<dyn SessionStore>) = match &config.cache {
        Backend::Memory => {
            warn!("CACHE_ADDR is memory://, sessions are local to this process");
            let cache: Arc<dyn CacheService> = Arc::new(MemoryCache::new());
            let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            (cache, sessions)
        }
        Backend::Url(url) => {
            info!("Connecting to Redis...");
            let redis = Arc::new(RedisAdapter::connect(url).await?);
            let cache: Arc<dyn CacheService> = redis.clone();
            let sessions: Arc<dyn SessionStore> = redis;
            (cache, sessions)
        }
    };

    // --- 4. Build the Shared AppState ---
    let passwords = PasswordService::new()?;
    let app_state = Arc::new(AppState::new(config.clone(), db, cache, sessions, passwords));

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let admin = app_state.users.bootstrap_admin(email, password).await?;
        info!(user_id = %admin.user_id, "Admin account ready");
    }

    // --- 5. Create the Web Router ---
    let mut app = Router::new()
        .merge(build_router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    if let Some(origin) = &config.cors_origin {
        app = app.layer(cors_layer(origin)?);
    }

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_mode {
        LogMode::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogMode::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer, ApiError> {
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("CORS_ORIGIN is not a valid origin: {}", e)))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]))
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
