use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use gateway_core::context::{generate_correlation_id, resolve_client_ip, RequestContext};
use gateway_core::router::RouterOutcome;
use gateway_core::GatewayError;
use gateway_proxy::envelope::error_response;
use gateway_proxy::{GatewayRequest, GatewayResponse};

use crate::AppState;

/// `GatewayResponse` is `http::Response<Bytes>`; axum's `Response` body
/// type is `axum::body::Body`, so every pipeline response is rewrapped
/// once on its way out.
fn into_axum_response(response: GatewayResponse) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, axum::body::Body::from(body))
}

/// Routes the request before it ever touches the middleware chain: a
/// 404/405 is a routing fact, not a pipeline outcome, so it bypasses
/// request-log/auth/rate-limit/response-log entirely (mirrors the
/// original handler's route-then-dispatch split).
pub async fn dispatch(State(state): State<AppState>, request: Request<axum::body::Body>) -> Response {
    let (parts, body) = request.into_parts();

    let path = parts.uri.path().to_string();
    let query = parts.uri.query().unwrap_or("").to_string();
    let method = parts.method.as_str().to_string();

    let correlation_id = correlation_id_for(&parts.headers, &state.correlation_id_header);

    let forwarded_for = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let peer_addr = parts
        .extensions
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let client_ip = resolve_client_ip(forwarded_for, &peer_addr);

    let user_agent = parts
        .headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome = state.router.match_route(&path, &method);

    let route_match = match outcome {
        RouterOutcome::Matched(m) => m,
        RouterOutcome::NotFound => {
            return into_axum_response(error_response(&GatewayError::NotFound, &correlation_id));
        }
        RouterOutcome::MethodNotAllowed(allowed) => {
            return into_axum_response(error_response(
                &GatewayError::MethodNotAllowed { allowed },
                &correlation_id,
            ));
        }
    };

    let mut ctx = RequestContext::new(method.clone(), path, query, client_ip, user_agent, correlation_id);
    ctx.route_match = Some(route_match);

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return into_axum_response(error_response(
                &GatewayError::Validation("request body too large".to_string()),
                &ctx.correlation_id,
            ));
        }
    };

    let req = GatewayRequest {
        headers: parts.headers,
        body,
    };

    state.metrics.active_connections.inc();
    let response = state.chain.execute(req, &mut ctx).await;
    state.metrics.active_connections.dec();

    let route_id = ctx
        .route_match
        .as_ref()
        .map(|m| m.route.id.clone())
        .unwrap_or_else(|| "unknown".to_string());
    state.metrics.record_request(
        &route_id,
        &method,
        response.status().as_u16(),
        ctx.elapsed_ms() as f64 / 1000.0,
    );

    into_axum_response(response)
}

fn correlation_id_for(headers: &HeaderMap, header_name: &str) -> String {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id)
}
