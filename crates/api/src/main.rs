//! # AI Gateway API Server
//!
//! HTTP server for the inline AI-governance gateway, built with Axum.
//! Every inbound request is classified for prompt injection, has PII
//! redacted, is checked against policy/spending state, forwarded to an
//! upstream chat-completion provider, metered into the spending ledger,
//! and audited.
//!
//! ## Middleware Stack
//!
//! Requests flow through middleware in this order:
//! 1. **Security Headers**: HSTS, CSP, X-Frame-Options
//! 2. **Request ID**: Unique tracking for request tracing
//! 3. **Tracing**: Structured logging with correlation IDs
//! 4. **Compression**: Gzip/Brotli response compression
//! 5. **CORS**: Cross-origin resource sharing policies
//! 6. **Catch panic**: Converts a handler panic into a sanitized 500
//!
//! Start the server:
//! ```bash
//! cargo run --bin gateway-server
//! ```

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use axum::http::{HeaderName, HeaderValue, Method};
use gateway_core::Config;
use gateway_core::error::Error;
use gateway_guard::repository::memory::{
    InMemoryPolicyRepository, InMemorySettingsRepository, InMemorySpendingLimitRepository, InMemoryUserRepository,
};
use gateway_guard::repository::{PolicyRepository, SettingsRepository, SpendingLimitRepository, UserRepository};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api_middleware;
mod error;
mod handlers;
mod health;
mod state;

use crate::{
    handlers::{control::control_routes, guard::guard_routes},
    state::AppState,
};

fn build_cors_layer(cors_config: &gateway_core::config::CorsConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let mut cors = CorsLayer::new();

    if cors_config.allowed_origins.contains(&"*".to_string()) {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Result<Vec<HeaderValue>, _> = cors_config.allowed_origins.iter().map(|origin| origin.parse()).collect();
        cors = cors.allow_origin(origins?);
    }

    if cors_config.allowed_methods.contains(&"*".to_string()) {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Result<Vec<Method>, _> = cors_config.allowed_methods.iter().map(|method| method.parse()).collect();
        cors = cors.allow_methods(methods?);
    }

    if cors_config.allowed_headers.contains(&"*".to_string()) {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Result<Vec<HeaderName>, _> = cors_config.allowed_headers.iter().map(|header| header.parse()).collect();
        cors = cors.allow_headers(headers?);
    }

    if !cors_config.expose_headers.is_empty() {
        let expose_headers: Result<Vec<HeaderName>, _> = cors_config.expose_headers.iter().map(|header| header.parse()).collect();
        cors = cors.expose_headers(expose_headers?);
    }

    cors = cors.allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting gateway server...");

    let config = Config::load()?;
    info!("Configuration loaded successfully");

    let (users, settings_repo): (Arc<dyn UserRepository>, Arc<dyn SettingsRepository>) = build_repositories(&config).await?;
    let policies: Arc<dyn PolicyRepository> = Arc::new(InMemoryPolicyRepository::new());
    let spending_limits: Arc<dyn SpendingLimitRepository> = Arc::new(InMemorySpendingLimitRepository::new());

    let app_state = AppState::new(config.clone(), users, policies, spending_limits, settings_repo);

    let app = create_app(app_state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn build_repositories(
    config: &Config,
) -> Result<(Arc<dyn UserRepository>, Arc<dyn SettingsRepository>), Box<dyn std::error::Error>> {
    if !config.storage.is_postgres() {
        return Ok((Arc::new(InMemoryUserRepository::new()), Arc::new(InMemorySettingsRepository::new())));
    }

    let url = config.storage.connection_string().ok_or("storage.backend is \"postgres\" but no connection details were set")?;
    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(&url).await?;
    info!("Connected to Postgres-backed users/settings repositories");

    Ok((
        Arc::new(gateway_guard::repository::postgres::PostgresUserRepository::new(pool.clone())),
        Arc::new(gateway_guard::repository::postgres::PostgresSettingsRepository::new(pool)),
    ))
}

#[cfg(not(feature = "postgres"))]
async fn build_repositories(
    config: &Config,
) -> Result<(Arc<dyn UserRepository>, Arc<dyn SettingsRepository>), Box<dyn std::error::Error>> {
    if config.storage.is_postgres() {
        return Err("storage.backend is \"postgres\" but this binary was built without the postgres feature".into());
    }
    Ok((Arc::new(InMemoryUserRepository::new()), Arc::new(InMemorySettingsRepository::new())))
}

fn create_app(state: AppState) -> Result<Router, Box<dyn std::error::Error>> {
    #[derive(OpenApi)]
    #[openapi(
        paths(health::health_check, health::readiness_check),
        components(schemas()),
        tags(
            (name = "health", description = "Health check endpoints"),
            (name = "guard", description = "Data-plane: classify, redact, and forward chat requests"),
            (name = "control", description = "Control-plane: policies, spending limits, users, audit, settings"),
        )
    )]
    struct ApiDoc;

    let cors_layer = build_cors_layer(&state.config.cors)?;

    let router = Router::new()
        .nest("/api/v1", create_api_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(api_middleware::security_headers::security_headers_middleware))
                .layer(axum::middleware::from_fn(api_middleware::request_id::request_id_middleware))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(cors_layer)
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
        .with_state(state)
        .fallback(handler_404);

    Ok(router)
}

fn create_api_routes() -> Router<AppState> {
    Router::new().merge(guard_routes()).nest("/control", control_routes())
}

fn handle_panic(err: Box<dyn std::any::Any + Send>) -> axum::response::Response {
    let message = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic.message = %message, "request handler panicked");
    error::ApiError::new(Error::internal("internal server error")).into_response()
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "Resource not found" })))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_api=debug,gateway_guard=debug,gateway_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
