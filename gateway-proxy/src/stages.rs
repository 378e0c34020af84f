use crate::chain::{GatewayRequest, GatewayResponse, Next, Stage, Terminal};
use crate::client::UpstreamClient;
use crate::envelope::{error_response, missing_token_response, unauthenticated_response};
use crate::headers::{construct_upstream_url, prepare_response_headers, prepare_upstream_headers};
use async_trait::async_trait;
use gateway_auth::{AuthDecision, Authenticator};
use gateway_core::config::RateLimitRuleConfig;
use gateway_core::context::RateLimitInfo;
use gateway_core::{GatewayError, RequestContext};
use gateway_observability::{pii_scrubber, AccessLogEntry, MetricsCollector};
use gateway_ratelimit::{KeyContext, RateLimitDecision, RateLimitEvaluator};
use http::header::{COOKIE, AUTHORIZATION};
use http::HeaderValue;
use std::sync::Arc;
use tracing::{info, warn};

/// Logs `request_received`. Never short-circuits; header values never
/// appear in the log, only which of them were sensitive enough to redact —
/// `redact_headers` (config, plus the always-sensitive set) decides that.
pub struct RequestLogStage {
    redact_headers: Vec<String>,
}

impl RequestLogStage {
    pub fn new(redact_headers: Vec<String>) -> Self {
        Self { redact_headers }
    }
}

#[async_trait]
impl Stage for RequestLogStage {
    async fn call(&self, req: GatewayRequest, ctx: &mut RequestContext, next: Next<'_>) -> GatewayResponse {
        let redacted_headers: Vec<&str> = req
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let value_str = value.to_str().unwrap_or("");
                let (_, scrubbed) = pii_scrubber::scrub_header(name.as_str(), value_str, &self.redact_headers);
                scrubbed.then_some(name.as_str())
            })
            .collect();
        info!(
            correlation_id = %ctx.correlation_id,
            method = %ctx.method,
            path = %ctx.path,
            client_ip = %ctx.client_ip,
            redacted_headers = ?redacted_headers,
            "request_received"
        );
        next.run(req, ctx).await
    }
}

/// Logs `request_completed` with the final status and latency, running
/// just inside error-trap: it sees the real response from every stage
/// below it, but not panics raised above it.
pub struct ResponseLogStage {
    anonymize_ip: bool,
}

impl ResponseLogStage {
    /// `anonymize_ip` pseudonymizes the access-log's client IP field;
    /// operators opt in by configuring a non-empty `logging.redact_headers`.
    pub fn new(anonymize_ip: bool) -> Self {
        Self { anonymize_ip }
    }
}

#[async_trait]
impl Stage for ResponseLogStage {
    async fn call(&self, req: GatewayRequest, ctx: &mut RequestContext, next: Next<'_>) -> GatewayResponse {
        let response = next.run(req, ctx).await;
        let status = response.status().as_u16();
        let latency_ms = ctx.elapsed_ms();
        info!(
            correlation_id = %ctx.correlation_id,
            status,
            latency_ms = latency_ms as u64,
            "request_completed"
        );

        let mut entry = AccessLogEntry::new(
            ctx.correlation_id.clone(),
            ctx.route_match.as_ref().map(|m| m.route.id.clone()),
            ctx.client_ip.clone(),
            ctx.method.clone(),
            ctx.path.clone(),
            status,
            latency_ms as f64,
            ctx.identity.user_id.clone(),
        );
        if self.anonymize_ip {
            entry.anonymize_ip();
        }
        tracing::info!(target: "access_log", line = %entry.to_json_line(), "access_log");

        response
    }
}

/// Extracts and validates the session token, populates `ctx.identity`,
/// and enforces the route's required roles. A route with
/// `auth_required = false` passes through untouched.
pub struct AuthenticatorStage {
    authenticator: Authenticator,
    metrics: Arc<MetricsCollector>,
    cookie_name: String,
    token_ttl: u64,
}

impl AuthenticatorStage {
    pub fn new(
        authenticator: Authenticator,
        metrics: Arc<MetricsCollector>,
        cookie_name: impl Into<String>,
        token_ttl: u64,
    ) -> Self {
        Self {
            authenticator,
            metrics,
            cookie_name: cookie_name.into(),
            token_ttl,
        }
    }
}

#[async_trait]
impl Stage for AuthenticatorStage {
    async fn call(&self, req: GatewayRequest, ctx: &mut RequestContext, next: Next<'_>) -> GatewayResponse {
        let Some(route_match) = ctx.route_match.clone() else {
            return next.run(req, ctx).await;
        };

        let cookie_header = req
            .headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let auth_header = req
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let decision = self
            .authenticator
            .authenticate(
                route_match.route.auth_required,
                &route_match.route.auth_roles,
                cookie_header.as_deref(),
                auth_header.as_deref(),
            )
            .await;

        match decision {
            AuthDecision::NotRequired => next.run(req, ctx).await,
            AuthDecision::MissingToken => {
                warn!(correlation_id = %ctx.correlation_id, path = %ctx.path, "authentication required but no token provided");
                self.metrics.record_auth_attempt("missing_token");
                missing_token_response(&ctx.correlation_id)
            }
            AuthDecision::InvalidToken => {
                info!(correlation_id = %ctx.correlation_id, path = %ctx.path, "invalid or expired token");
                self.metrics.record_auth_attempt("invalid_token");
                unauthenticated_response(&GatewayError::InvalidToken, &ctx.correlation_id)
            }
            AuthDecision::Forbidden { identity } => {
                warn!(correlation_id = %ctx.correlation_id, user_id = ?identity.user_id, "authorization denied");
                self.metrics.record_auth_attempt("forbidden");
                ctx.identity = identity;
                error_response(&GatewayError::Forbidden, &ctx.correlation_id)
            }
            AuthDecision::Authorized { identity, new_token } => {
                self.metrics.record_auth_attempt("success");
                ctx.identity = identity;
                let mut response = next.run(req, ctx).await;
                if let Some(token) = new_token {
                    self.metrics.record_auth_refresh("session");
                    set_refreshed_token_cookie(&mut response, &self.cookie_name, &token, self.token_ttl);
                }
                response
            }
        }
    }
}

fn set_refreshed_token_cookie(response: &mut GatewayResponse, cookie_name: &str, token: &str, token_ttl: u64) {
    let cookie = format!("{cookie_name}={token}; HttpOnly; Secure; SameSite=Lax; Max-Age={token_ttl}");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(http::header::SET_COOKIE, value);
    }
}

/// Selects the rules that apply to the matched route, evaluates them in
/// order, and stamps `X-RateLimit-*` / `Retry-After` on every response —
/// allowed or denied — using the first applicable rule's quota.
pub struct RateLimiterStage {
    evaluator: RateLimitEvaluator,
    rules: Vec<RateLimitRuleConfig>,
    enabled: bool,
    metrics: Arc<MetricsCollector>,
}

impl RateLimiterStage {
    pub fn new(
        evaluator: RateLimitEvaluator,
        rules: Vec<RateLimitRuleConfig>,
        enabled: bool,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { evaluator, rules, enabled, metrics }
    }
}

#[async_trait]
impl Stage for RateLimiterStage {
    async fn call(&self, req: GatewayRequest, ctx: &mut RequestContext, next: Next<'_>) -> GatewayResponse {
        if !self.enabled {
            return next.run(req, ctx).await;
        }
        let Some(route_match) = ctx.route_match.clone() else {
            return next.run(req, ctx).await;
        };

        let key_ctx = KeyContext {
            client_ip: &ctx.client_ip,
            user_id: ctx.identity.user_id.as_deref(),
            authenticated: ctx.identity.authenticated,
            route_id: Some(route_match.route.id.as_str()),
        };

        let decision = self
            .evaluator
            .evaluate(&key_ctx, &self.rules, Some(route_match.route.id.as_str()))
            .await;

        match decision {
            RateLimitDecision::NoRulesApplied => next.run(req, ctx).await,
            RateLimitDecision::Allowed { headers, rule_name } => {
                self.metrics.record_rate_limit_decision(&rule_name, true);
                ctx.rate_limit = Some(RateLimitInfo {
                    key: String::new(),
                    limit: headers.limit,
                    remaining: headers.remaining,
                    reset_at: headers.reset_at,
                    retry_after: None,
                });
                let mut response = next.run(req, ctx).await;
                stamp_rate_limit_headers(&mut response, &headers);
                response
            }
            RateLimitDecision::Denied { state, rule_name } => {
                info!(
                    correlation_id = %ctx.correlation_id,
                    rule = %rule_name,
                    client_ip = %ctx.client_ip,
                    "rate limit exceeded"
                );
                self.metrics.record_rate_limit_decision(&rule_name, false);
                let mut response = error_response(
                    &GatewayError::RateLimitExceeded {
                        retry_after: state.retry_after.unwrap_or(60),
                    },
                    &ctx.correlation_id,
                );
                stamp_rate_limit_headers(&mut response, &state);
                response
            }
        }
    }
}

fn stamp_rate_limit_headers(response: &mut GatewayResponse, state: &gateway_ratelimit::RateLimitState) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&state.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&state.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&state.reset_at.to_string()) {
        headers.insert("x-ratelimit-reset", v);
    }
    if let Some(retry_after) = state.retry_after {
        if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
            headers.insert(http::header::RETRY_AFTER, v);
        }
    }
}

/// The terminal node: forwards the request to the matched route's
/// upstream and relays the response, mapping transport failures to the
/// pipeline's error envelope.
pub struct ProxyTerminal {
    client: UpstreamClient,
    metrics: Arc<MetricsCollector>,
}

impl ProxyTerminal {
    pub fn new(client: UpstreamClient, metrics: Arc<MetricsCollector>) -> Self {
        Self { client, metrics }
    }
}

#[async_trait]
impl Terminal for ProxyTerminal {
    async fn call(&self, req: GatewayRequest, ctx: &mut RequestContext) -> GatewayResponse {
        let Some(route_match) = ctx.route_match.clone() else {
            return error_response(
                &GatewayError::Internal("no route match found".to_string()),
                &ctx.correlation_id,
            );
        };
        let route = &route_match.route;

        let Some(upstream_url) = construct_upstream_url(&route.upstream_url, &ctx.path, &ctx.query) else {
            return error_response(
                &GatewayError::Internal("could not construct upstream url".to_string()),
                &ctx.correlation_id,
            );
        };

        let upstream_headers = prepare_upstream_headers(
            &req.headers,
            &upstream_url,
            &ctx.correlation_id,
            ctx.identity.user_id.as_deref(),
            &ctx.client_ip,
        );

        let method = match ctx.method.parse::<http::Method>() {
            Ok(m) => m,
            Err(_) => {
                return error_response(
                    &GatewayError::Internal("invalid HTTP method".to_string()),
                    &ctx.correlation_id,
                )
            }
        };

        let upstream_start = std::time::Instant::now();
        let forwarded = tokio::time::timeout(
            route.timeout,
            self.client
                .forward(method, &upstream_url, upstream_headers, req.body, &ctx.correlation_id),
        )
        .await;
        self.metrics
            .upstream_latency
            .with_label_values(&[&route.upstream_url])
            .observe(upstream_start.elapsed().as_secs_f64());

        match forwarded {
            Err(_elapsed) => {
                warn!(correlation_id = %ctx.correlation_id, upstream_url, route_timeout_secs = route.timeout.as_secs(), "route timeout exceeded");
                error_response(&GatewayError::GatewayTimeout, &ctx.correlation_id)
            }
            Ok(Ok((status, headers, body))) => {
                info!(
                    correlation_id = %ctx.correlation_id,
                    upstream_url,
                    status = status.as_u16(),
                    latency_ms = ctx.elapsed_ms() as u64,
                    "request proxied successfully"
                );
                let response_headers = prepare_response_headers(&headers, &ctx.correlation_id);
                let mut builder = http::Response::builder().status(status);
                *builder.headers_mut().unwrap() = response_headers;
                builder.body(body).unwrap_or_else(|_| {
                    error_response(&GatewayError::BadGateway, &ctx.correlation_id)
                })
            }
            Ok(Err(err)) => {
                warn!(correlation_id = %ctx.correlation_id, upstream_url, error = %err, "upstream request failed");
                error_response(&err, &ctx.correlation_id)
            }
        }
    }
}
