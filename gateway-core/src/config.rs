use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level gateway configuration, loaded from a YAML file merged with
/// environment variable overrides (`GATEWAY_<SECTION>__<KEY>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub rate_limiting: RateLimitConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_keepalive_timeout")]
    pub keepalive_timeout: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub id: String,
    pub path_pattern: String,
    pub methods: Vec<String>,
    pub upstream_url: String,
    #[serde(default = "default_true")]
    pub auth_required: bool,
    #[serde(default)]
    pub auth_roles: Vec<String>,
    #[serde(default = "default_route_timeout")]
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_output")]
    pub output: String,
    #[serde(default = "default_correlation_header")]
    pub correlation_id_header: String,
    #[serde(default = "default_redact_headers")]
    pub redact_headers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_store_url")]
    pub session_store_url: String,
    #[serde(default)]
    pub token_signing_secret: Option<String>,
    #[serde(default = "default_token_ttl")]
    pub token_ttl: u64,
    #[serde(default = "default_true")]
    pub refresh_enabled: bool,
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold: u64,
}

impl SessionConfig {
    /// A signing secret switches the gateway from opaque to signed tokens.
    pub fn uses_signed_tokens(&self) -> bool {
        self.token_signing_secret.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Ip,
    User,
    Route,
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    TokenBucket,
    FixedWindow,
    SlidingWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRuleConfig {
    pub name: String,
    #[serde(default = "default_key_type")]
    pub key_type: KeyType,
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    pub limit: u64,
    pub window: u64,
    #[serde(default)]
    pub burst: Option<u64>,
    #[serde(default)]
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ratelimit_store_url")]
    pub store_url: String,
    #[serde(default = "default_fail_mode")]
    pub fail_mode: FailMode,
    #[serde(default)]
    pub rules: Vec<RateLimitRuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_connect_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_upstream_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Present for parity with the original config surface; the proxy never
    /// retries a forwarded request regardless of this flag (see DESIGN.md).
    #[serde(default)]
    pub retry_enabled: bool,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_health_endpoint")]
    pub health_endpoint: String,
    #[serde(default = "default_liveness_endpoint")]
    pub liveness_endpoint: String,
    #[serde(default = "default_readiness_endpoint")]
    pub readiness_endpoint: String,
}

impl GatewayConfig {
    /// Load configuration from an optional YAML path, then apply
    /// `GATEWAY_`-prefixed environment overrides.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["gateway.yaml", "/etc/gateway/gateway.yaml", "config/gateway.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("GATEWAY_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Schema-driven validation beyond what serde/figment enforce structurally.
    fn validate(&self) -> anyhow::Result<()> {
        if self.server.tls_enabled {
            let cert = self
                .server
                .tls_cert_path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("tls_enabled requires tls_cert_path"))?;
            let key = self
                .server
                .tls_key_path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("tls_enabled requires tls_key_path"))?;
            if !cert.exists() {
                anyhow::bail!("TLS cert file not found: {}", cert.display());
            }
            if !key.exists() {
                anyhow::bail!("TLS key file not found: {}", key.display());
            }
        }
        for rule in &self.rate_limiting.rules {
            if rule.limit == 0 {
                anyhow::bail!("rate limit rule '{}' has limit 0", rule.name);
            }
            if rule.window == 0 {
                anyhow::bail!("rate limit rule '{}' has window 0", rule.name);
            }
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            routes: Vec::new(),
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
            rate_limiting: RateLimitConfig::default(),
            upstream: UpstreamConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls_enabled: false,
            tls_cert_path: None,
            tls_key_path: None,
            connection_timeout: default_connection_timeout(),
            keepalive_timeout: default_keepalive_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: default_log_output(),
            correlation_id_header: default_correlation_header(),
            redact_headers: default_redact_headers(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_store_url: default_session_store_url(),
            token_signing_secret: None,
            token_ttl: default_token_ttl(),
            refresh_enabled: true,
            refresh_threshold: default_refresh_threshold(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_url: default_ratelimit_store_url(),
            fail_mode: default_fail_mode(),
            rules: Vec::new(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connection_timeout: default_upstream_connect_timeout(),
            request_timeout: default_upstream_request_timeout(),
            pool_size: default_pool_size(),
            retry_enabled: false,
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_metrics_endpoint(),
            health_endpoint: default_health_endpoint(),
            liveness_endpoint: default_liveness_endpoint(),
            readiness_endpoint: default_readiness_endpoint(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_connection_timeout() -> u64 {
    60
}
fn default_keepalive_timeout() -> u64 {
    75
}
fn default_max_connections() -> u32 {
    1000
}
fn default_route_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_log_output() -> String {
    "stdout".to_string()
}
fn default_correlation_header() -> String {
    "X-Request-ID".to_string()
}
fn default_redact_headers() -> Vec<String> {
    vec![
        "Authorization".to_string(),
        "Cookie".to_string(),
        "Set-Cookie".to_string(),
    ]
}
fn default_cookie_name() -> String {
    "session_token".to_string()
}
fn default_session_store_url() -> String {
    "memory://".to_string()
}
fn default_token_ttl() -> u64 {
    3600
}
fn default_refresh_threshold() -> u64 {
    300
}
fn default_key_type() -> KeyType {
    KeyType::User
}
fn default_algorithm() -> Algorithm {
    Algorithm::TokenBucket
}
fn default_ratelimit_store_url() -> String {
    "memory://".to_string()
}
fn default_fail_mode() -> FailMode {
    FailMode::Open
}
fn default_upstream_connect_timeout() -> u64 {
    5
}
fn default_upstream_request_timeout() -> u64 {
    30
}
fn default_pool_size() -> usize {
    100
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_metrics_endpoint() -> String {
    "/metrics".to_string()
}
fn default_health_endpoint() -> String {
    "/health".to_string()
}
fn default_liveness_endpoint() -> String {
    "/health/live".to_string()
}
fn default_readiness_endpoint() -> String {
    "/health/ready".to_string()
}
fn default_true() -> bool {
    true
}
