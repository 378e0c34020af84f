use async_trait::async_trait;
use bytes::Bytes;
use gateway_core::RequestContext;
use http::HeaderMap;
use std::sync::Arc;

/// Everything a stage needs besides [`RequestContext`]: the parts of the
/// inbound HTTP request that aren't already projected onto the context
/// (method/path/query live there; body and raw headers don't).
pub struct GatewayRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type GatewayResponse = http::Response<Bytes>;

/// A stage in the chain. Mirrors the contract directly: pre-process,
/// call `next` (or don't, to short-circuit), post-process the result.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn call(
        &self,
        req: GatewayRequest,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> GatewayResponse;
}

/// The terminal node of the chain: always produces a response, never
/// calls anything further. Implemented by the upstream forwarder.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn call(&self, req: GatewayRequest, ctx: &mut RequestContext) -> GatewayResponse;
}

/// The remainder of the chain from a stage's point of view.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    terminal: &'a Arc<dyn Terminal>,
}

impl<'a> Next<'a> {
    pub async fn run(self, req: GatewayRequest, ctx: &mut RequestContext) -> GatewayResponse {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    terminal: self.terminal,
                };
                stage.call(req, ctx, next).await
            }
            None => self.terminal.call(req, ctx).await,
        }
    }
}

/// An ordered, pre-assembled chain. Built once at startup from the
/// mandatory stage ordering (request-log, authenticator, rate-limiter,
/// response-log) with the upstream forwarder as the terminal node;
/// error-trap is composed around this at the HTTP-server layer via
/// `tower_http::catch_panic`, not as a stage here, since catching panics
/// across an arbitrary async boundary is exactly what that layer exists
/// to do correctly.
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Stage>>,
    terminal: Arc<dyn Terminal>,
}

impl MiddlewareChain {
    pub fn new(stages: Vec<Arc<dyn Stage>>, terminal: Arc<dyn Terminal>) -> Self {
        Self { stages, terminal }
    }

    pub async fn execute(&self, req: GatewayRequest, ctx: &mut RequestContext) -> GatewayResponse {
        let next = Next {
            stages: &self.stages,
            terminal: &self.terminal,
        };
        next.run(req, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::context::RequestContext as Ctx;

    struct EchoTerminal;

    #[async_trait]
    impl Terminal for EchoTerminal {
        async fn call(&self, req: GatewayRequest, _ctx: &mut Ctx) -> GatewayResponse {
            http::Response::builder().status(200).body(req.body).unwrap()
        }
    }

    struct TagStage(&'static str);

    #[async_trait]
    impl Stage for TagStage {
        async fn call(&self, req: GatewayRequest, ctx: &mut Ctx, next: Next<'_>) -> GatewayResponse {
            ctx.attributes.insert(
                self.0.to_string(),
                serde_json::Value::Bool(true),
            );
            next.run(req, ctx).await
        }
    }

    struct ShortCircuitStage;

    #[async_trait]
    impl Stage for ShortCircuitStage {
        async fn call(&self, _req: GatewayRequest, _ctx: &mut Ctx, _next: Next<'_>) -> GatewayResponse {
            http::Response::builder()
                .status(403)
                .body(Bytes::from_static(b"denied"))
                .unwrap()
        }
    }

    fn ctx() -> Ctx {
        Ctx::new(
            "GET".into(),
            "/x".into(),
            "".into(),
            "127.0.0.1".into(),
            None,
            "req-test".into(),
        )
    }

    #[tokio::test]
    async fn stages_run_in_order_and_reach_terminal() {
        let chain = MiddlewareChain::new(
            vec![Arc::new(TagStage("a")), Arc::new(TagStage("b"))],
            Arc::new(EchoTerminal),
        );
        let mut context = ctx();
        let req = GatewayRequest {
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"hello"),
        };
        let response = chain.execute(req, &mut context).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), &Bytes::from_static(b"hello"));
        assert!(context.attributes.contains_key("a"));
        assert!(context.attributes.contains_key("b"));
    }

    #[tokio::test]
    async fn short_circuit_stops_remaining_stages_and_terminal() {
        let chain = MiddlewareChain::new(
            vec![Arc::new(ShortCircuitStage), Arc::new(TagStage("unreached"))],
            Arc::new(EchoTerminal),
        );
        let mut context = ctx();
        let req = GatewayRequest {
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let response = chain.execute(req, &mut context).await;
        assert_eq!(response.status(), 403);
        assert!(!context.attributes.contains_key("unreached"));
    }
}
