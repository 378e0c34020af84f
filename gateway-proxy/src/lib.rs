pub mod chain;
pub mod client;
pub mod envelope;
pub mod headers;
pub mod stages;

pub use chain::{GatewayRequest, GatewayResponse, MiddlewareChain, Next, Stage, Terminal};
pub use client::UpstreamClient;
pub use stages::{AuthenticatorStage, ProxyTerminal, RateLimiterStage, RequestLogStage, ResponseLogStage};

use gateway_auth::Authenticator;
use gateway_core::config::RateLimitRuleConfig;
use gateway_observability::MetricsCollector;
use gateway_ratelimit::RateLimitEvaluator;
use std::sync::Arc;

/// Assembles the mandatory chain in its specified order — request-log,
/// authenticator, rate-limiter, response-log — with the upstream
/// forwarder as the terminal node. `response-log` wraps `proxy` directly
/// since nothing runs between the response leaving the upstream and the
/// log line recording it.
#[allow(clippy::too_many_arguments)]
pub fn build_chain(
    authenticator: Authenticator,
    cookie_name: impl Into<String>,
    token_ttl: u64,
    redact_headers: Vec<String>,
    rate_limit_evaluator: RateLimitEvaluator,
    rate_limit_rules: Vec<RateLimitRuleConfig>,
    rate_limit_enabled: bool,
    upstream_client: UpstreamClient,
    metrics: Arc<MetricsCollector>,
) -> MiddlewareChain {
    let anonymize_ip = !redact_headers.is_empty();
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(RequestLogStage::new(redact_headers)),
        Arc::new(AuthenticatorStage::new(
            authenticator,
            metrics.clone(),
            cookie_name,
            token_ttl,
        )),
        Arc::new(RateLimiterStage::new(
            rate_limit_evaluator,
            rate_limit_rules,
            rate_limit_enabled,
            metrics.clone(),
        )),
        Arc::new(ResponseLogStage::new(anonymize_ip)),
    ];
    let terminal = Arc::new(ProxyTerminal::new(upstream_client, metrics));
    MiddlewareChain::new(stages, terminal)
}
