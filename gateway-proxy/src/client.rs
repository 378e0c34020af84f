use bytes::Bytes;
use gateway_core::GatewayError;
use http::{HeaderMap, Method};
use std::time::Duration;
use tracing::{debug, error};

/// Thin wrapper over a shared [`reqwest::Client`]. One instance is built
/// at startup and cloned into every request task; `reqwest::Client`
/// pools connections internally so cloning is cheap.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration, pool_size: usize) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .pool_max_idle_per_host(pool_size)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub async fn forward(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
        correlation_id: &str,
    ) -> Result<(http::StatusCode, HeaderMap, Bytes), GatewayError> {
        debug!(correlation_id, method = %method, url, "forwarding request upstream");

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| classify(&e, correlation_id, url))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&e, correlation_id, url))?;

        Ok((status, headers, body))
    }
}

fn classify(error: &reqwest::Error, correlation_id: &str, url: &str) -> GatewayError {
    if error.is_timeout() {
        error!(correlation_id, url, "upstream request timed out");
        GatewayError::GatewayTimeout
    } else {
        error!(correlation_id, url, error = %error, "upstream request failed");
        GatewayError::BadGateway
    }
}
