mod dispatch;
mod health;
mod store;
mod tls;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router as AxumRouter;
use clap::Parser;
use gateway_auth::Authenticator;
use gateway_core::route::Route;
use gateway_core::router::Router;
use gateway_core::GatewayConfig;
use gateway_observability::MetricsCollector;
use gateway_proxy::UpstreamClient;
use gateway_ratelimit::RateLimitEvaluator;
use gateway_store::{RateLimitStore, SessionStore};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "gateway", about = "HTTP API gateway: routing, auth, and rate limiting")]
struct Cli {
    /// Path to the YAML config file; falls back to the default search path.
    #[arg(long)]
    config: Option<String>,
}

/// Shared, per-process state handed to every axum handler. Everything here
/// is cheap to clone: either an `Arc` or a small value type.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub router: Arc<Router>,
    pub chain: Arc<gateway_proxy::MiddlewareChain>,
    pub session_store: Arc<SessionStore>,
    pub rate_limit_store: Arc<RateLimitStore>,
    pub metrics: Arc<MetricsCollector>,
    pub correlation_id_header: String,
    pub max_body_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;

    gateway_observability::logging::init(&config.logging)?;
    info!(environment = %config.environment, "starting gateway");

    let metrics = Arc::new(MetricsCollector::new()?);

    let session_backend = store::build_state_store(&config.session.session_store_url).await?;
    let rate_limit_backend = store::build_state_store(&config.rate_limiting.store_url).await?;

    let session_store = Arc::new(SessionStore::new(session_backend));
    let rate_limit_store = Arc::new(RateLimitStore::new(rate_limit_backend.clone()));

    let authenticator = Authenticator::new(
        session_store.clone(),
        config.session.cookie_name.clone(),
        config.session.token_signing_secret.clone(),
        config.session.refresh_enabled,
        config.session.refresh_threshold,
        config.session.token_ttl,
    );

    let rate_limit_evaluator = RateLimitEvaluator::new(
        RateLimitStore::new(rate_limit_backend),
        config.rate_limiting.fail_mode,
    );

    let upstream_client = UpstreamClient::new(
        Duration::from_secs(config.upstream.connection_timeout),
        Duration::from_secs(config.upstream.request_timeout),
        config.upstream.pool_size,
    )?;

    let routes: Vec<Route> = config.routes.iter().map(Route::from).collect();
    let router = Arc::new(Router::new(routes)?);

    let chain = Arc::new(gateway_proxy::build_chain(
        authenticator,
        config.session.cookie_name.clone(),
        config.session.token_ttl,
        config.logging.redact_headers.clone(),
        rate_limit_evaluator,
        config.rate_limiting.rules.clone(),
        config.rate_limiting.enabled,
        upstream_client,
        metrics.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        router,
        chain,
        session_store,
        rate_limit_store,
        metrics,
        correlation_id_header: config.logging.correlation_id_header.clone(),
        max_body_bytes: MAX_REQUEST_BODY_BYTES,
    };

    let app = AxumRouter::new()
        .route(&config.metrics.health_endpoint, get(health::health))
        .route(&config.metrics.liveness_endpoint, get(health::live))
        .route(&config.metrics.readiness_endpoint, get(health::ready))
        .route(&config.metrics.endpoint, get(health::metrics))
        .fallback(dispatch::dispatch)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    if config.server.tls_enabled {
        let tls_config = tls::load_server_config(&config.server)?;
        let tcp = TcpListener::bind(addr).await?;
        info!(%addr, "gateway listening (tls)");
        let listener = tls::TlsListener::new(tcp, tls_config);
        axum::serve(listener, make_service)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "gateway listening");
        axum::serve(listener, make_service)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    info!("gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}
