//! ShopBoard API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and role checks
//! - Request validation
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use shopboard_common::{
    auth::JwtManager,
    cache::{Cache, MemoryBackend},
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    metrics::{self, LATENCY_BUCKETS, METRICS_PREFIX, STORE_API_BUCKETS},
    reports::ReportService,
    woocommerce::WooCommerceClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub cache: Cache,
    pub reports: ReportService,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration; APP_CONFIG_FILE replaces the layered lookup
    let config = match std::env::var("APP_CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path),
        Err(_) => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.observability);

    info!("Starting ShopBoard API Gateway v{}", shopboard_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    init_metrics(&config.observability)?;
    metrics::register_metrics();

    let jwt_secret = config
        .auth
        .jwt_secret
        .as_deref()
        .filter(|secret| !secret.is_empty())
        .context("auth.jwt_secret must be set (APP__AUTH__JWT_SECRET)")?;
    let jwt = Arc::new(JwtManager::new(
        jwt_secret,
        config.auth.jwt_expiration_secs,
        config.auth.remember_me_expiration_secs,
    ));

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    // Initialize cache
    let cache = if config.redis.in_memory {
        warn!("Using the in-process cache backend; entries are not shared between instances");
        Cache::new(
            Arc::new(MemoryBackend::new()),
            Duration::from_secs(config.redis.default_ttl_secs),
            Duration::from_millis(config.redis.op_timeout_ms),
            config.redis.key_prefix.clone(),
        )
    } else {
        Cache::connect(&config.redis).await?
    };

    let store_api = Arc::new(WooCommerceClient::new(&config.store_api)?);

    // Create app state
    let state = AppState {
        config: config.clone(),
        repo: Repository::new(db),
        reports: ReportService::new(store_api, cache.clone()),
        cache,
        jwt,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Start the Prometheus exporter unless disabled with port 0
fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_store_api_duration_seconds", METRICS_PREFIX)),
            STORE_API_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let rate_limit = &state.config.rate_limit;
    let limiter = rate_limit.enabled.then(|| {
        middleware::rate_limit::create_rate_limiter(
            rate_limit.requests_per_second,
            rate_limit.burst,
        )
    });
    let timeout = TimeoutLayer::new(state.config.request_timeout());
    let concurrency = GlobalConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests);

    let mut api_routes = api_routes()
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests));
    if let Some(limiter) = limiter {
        api_routes = api_routes.layer(axum::middleware::from_fn(move |request, next| {
            middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone())
        }));
    }

    // Compose the app
    Router::new()
        .nest("/api/v1", api_routes)
        .layer(timeout)
        .layer(concurrency)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Every `/api/v1` route
fn api_routes() -> Router<AppState> {
    use handlers::{auth, company, health, members, profile, reports, stores};

    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))

        // Authentication (no auth)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))

        // Profile
        .route("/me", get(profile::get_me).patch(profile::update_me))

        // Company
        .route("/company", get(company::get_company).patch(company::update_company))

        // Members and invitations
        .route("/members", get(members::list_members))
        .route(
            "/members/invitations",
            get(members::list_invitations).post(members::invite_member),
        )
        .route(
            "/members/invitations/{id}",
            axum::routing::delete(members::revoke_invitation),
        )
        .route(
            "/members/{user_id}",
            axum::routing::patch(members::update_member_role).delete(members::remove_member),
        )
        .route("/invitations/{token}/accept", post(members::accept_invitation))

        // Stores
        .route("/stores", get(stores::list_stores).post(stores::create_store))
        .route(
            "/stores/{id}",
            get(stores::get_store)
                .patch(stores::update_store)
                .delete(stores::delete_store),
        )
        .route("/stores/{id}/test-connection", post(stores::test_connection))

        // Reports
        .route("/reports/{namespace}", get(reports::get_report))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    /// State without a database; only requests that never reach it are sent
    fn test_state() -> AppState {
        let config = AppConfig::default();
        let db = DbPool {
            primary: sea_orm::DatabaseConnection::Disconnected,
            replica: None,
        };
        let cache = Cache::in_memory(Duration::from_secs(300));
        let store_api = Arc::new(WooCommerceClient::new(&config.store_api).unwrap());

        AppState {
            config: Arc::new(config),
            repo: Repository::new(db),
            reports: ReportService::new(store_api, cache.clone()),
            cache,
            jwt: Arc::new(JwtManager::new("test-secret", 3600, 7200)),
        }
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = create_router(test_state()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (status, body) = send(
            Request::get("/api/v1/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_tenant_routes_require_a_token() {
        let (status, body) = send(
            Request::get("/api/v1/reports/orders").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_invalid_registration_reports_every_field() {
        let request = Request::post("/api/v1/auth/register")
            .header("content-type", "application/json")
            .header("accept-language", "es")
            .body(Body::from(
                r#"{"email":"not-an-email","name":"A","password":"short"}"#,
            ))
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let fields: Vec<&str> = body["error"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"password"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_validation_error() {
        let request = Request::post("/api/v1/auth/login")
            .header("content-type", "application/json")
            .body(Body::from("{"))
            .unwrap();

        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["fields"][0]["code"], "invalid_body");
    }

    #[tokio::test]
    async fn test_unknown_report_rejected_before_database() {
        let state = test_state();
        let token = state
            .jwt
            .generate_token(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), false)
            .unwrap();
        let request = Request::get("/api/v1/reports/customers")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
