//! PaperDesk API Gateway
//!
//! The HTTP front of the review workflow.
//! Handles:
//! - Bearer-token authentication
//! - Rate limiting
//! - Multipart submissions and request routing
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use paperdesk_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    errors::AppError,
    metrics::{register_metrics, LATENCY_BUCKETS},
    notify,
    storage::LocalBlobStore,
    JwtManager, Workflow, WorkflowSettings,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use middleware::rate_limit::{create_rate_limiter, rate_limit};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub workflow: Workflow,
    pub jwt: Arc<JwtManager>,
    pub repo: Arc<Repository>,
    /// Request body cap, echoed in 413 responses
    pub max_upload_bytes: usize,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config);
    info!("Starting PaperDesk API Gateway v{}", paperdesk_common::VERSION);

    // Initialize metrics
    init_metrics(&config)?;

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }
    let repo = Arc::new(Repository::new(db));

    let secret = config.auth.jwt_secret.as_deref().ok_or_else(|| AppError::Configuration {
        message: "auth.jwt_secret must be set".to_string(),
    })?;
    let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));

    let workflow = Workflow::new(
        repo.clone(),
        repo.clone(),
        Arc::new(LocalBlobStore::from_config(&config.storage)),
        Arc::from(notify::from_config(&config.mail)?),
        WorkflowSettings::from_config(&config),
    );

    let state = AppState {
        workflow,
        jwt,
        repo,
        max_upload_bytes: config.server.max_upload_bytes,
    };
    let app = create_router(state, &config);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.shutdown_timeout()))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.observability.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }
}

/// Install the Prometheus recorder with its own scrape listener
fn init_metrics(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_port == 0 {
        warn!("Metrics exporter disabled (metrics_port = 0)");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), LATENCY_BUCKETS)?
        .install()?;

    register_metrics();
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState, config: &AppConfig) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let mut api_routes = Router::new()
        .route(
            "/papers",
            post(handlers::papers::submit_paper)
                .get(handlers::papers::list_papers)
                .delete(handlers::papers::delete_papers),
        )
        .route(
            "/papers/{id}",
            get(handlers::papers::get_paper).put(handlers::papers::update_paper),
        )
        .route("/papers/{id}/assignment", post(handlers::reviews::assign_reviewer))
        .route("/papers/{id}/accept", post(handlers::reviews::accept_paper))
        .route("/papers/{id}/decline", post(handlers::reviews::decline_paper))
        .route("/papers/{id}/decision", post(handlers::reviews::decide_paper))
        .route("/reviewers", get(handlers::users::list_reviewers))
        .route_layer(from_fn(middleware::metrics::track_requests));

    if config.rate_limit.enabled {
        let limiter = create_rate_limiter(config.rate_limit.requests_per_second, config.rate_limit.burst);
        api_routes = api_routes.layer(from_fn_with_state(limiter, rate_limit));
    } else {
        warn!("Rate limiting disabled");
    }

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .nest_service("/files", ServeDir::new(&config.storage.root_dir))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(config.request_timeout()))
                .layer(cors),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    // In-flight requests get this long before the process exits regardless
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(?grace, "Shutdown grace period elapsed, exiting");
        std::process::exit(0);
    });
}
