use crate::algorithm::{self, RateLimitState};
use crate::key::{self, KeyContext};
use gateway_core::config::{Algorithm, FailMode, RateLimitRuleConfig};
use gateway_store::RateLimitStore;
use tracing::warn;

fn applicable_rules<'a>(
    rules: &'a [RateLimitRuleConfig],
    route_id: Option<&str>,
) -> Vec<&'a RateLimitRuleConfig> {
    rules
        .iter()
        .filter(|rule| {
            rule.routes.is_empty() || route_id.is_some_and(|id| rule.routes.iter().any(|r| r == id))
        })
        .collect()
}

fn fail_mode_state(rule: &RateLimitRuleConfig, fail_mode: FailMode) -> RateLimitState {
    match fail_mode {
        FailMode::Open => {
            warn!(rule = %rule.name, "rate limit store unavailable, failing open");
            RateLimitState {
                allowed: true,
                remaining: rule.limit,
                limit: rule.limit,
                reset_at: 0,
                retry_after: None,
            }
        }
        FailMode::Closed => {
            warn!(rule = %rule.name, "rate limit store unavailable, failing closed");
            RateLimitState {
                allowed: false,
                remaining: 0,
                limit: rule.limit,
                reset_at: 0,
                retry_after: Some(60),
            }
        }
    }
}

async fn evaluate_rule(
    store: &RateLimitStore,
    ctx: &KeyContext<'_>,
    rule: &RateLimitRuleConfig,
    fail_mode: FailMode,
) -> RateLimitState {
    if !store.is_healthy().await {
        return fail_mode_state(rule, fail_mode);
    }

    let rate_limit_key = key::generate_key(ctx, &rule.name, rule.key_type);
    let result = match rule.algorithm {
        Algorithm::TokenBucket => {
            algorithm::token_bucket(store, &rate_limit_key, rule.limit, rule.window, rule.burst)
                .await
        }
        Algorithm::FixedWindow => {
            algorithm::fixed_window(store, &rate_limit_key, rule.limit, rule.window).await
        }
        Algorithm::SlidingWindow => {
            algorithm::sliding_window(store, &rate_limit_key, rule.limit, rule.window).await
        }
    };

    match result {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, rule = %rule.name, "rate limit store call failed");
            fail_mode_state(rule, fail_mode)
        }
    }
}

/// Decision for a full request: either every applicable rule allowed it
/// (`headers` reflects the first applicable rule, matching the reference
/// behavior of always reporting the primary rule's quota) or the first
/// rule to deny short-circuits the rest.
#[derive(Debug)]
pub enum RateLimitDecision {
    NoRulesApplied,
    Allowed { headers: RateLimitState, rule_name: String },
    Denied { state: RateLimitState, rule_name: String },
}

pub struct RateLimitEvaluator {
    store: RateLimitStore,
    fail_mode: FailMode,
}

impl RateLimitEvaluator {
    pub fn new(store: RateLimitStore, fail_mode: FailMode) -> Self {
        Self { store, fail_mode }
    }

    pub async fn evaluate(
        &self,
        ctx: &KeyContext<'_>,
        rules: &[RateLimitRuleConfig],
        route_id: Option<&str>,
    ) -> RateLimitDecision {
        let rules = applicable_rules(rules, route_id);
        if rules.is_empty() {
            return RateLimitDecision::NoRulesApplied;
        }

        let mut headers = None;
        for rule in &rules {
            let state = evaluate_rule(&self.store, ctx, rule, self.fail_mode).await;
            if headers.is_none() {
                headers = Some((state.clone(), rule.name.clone()));
            }
            if !state.allowed {
                return RateLimitDecision::Denied {
                    state,
                    rule_name: rule.name.clone(),
                };
            }
        }

        let (headers, rule_name) = headers.expect("rules is non-empty");
        RateLimitDecision::Allowed { headers, rule_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::config::KeyType;
    use gateway_store::InMemoryStateStore;
    use std::sync::Arc;

    fn rule(name: &str, limit: u64, routes: &[&str]) -> RateLimitRuleConfig {
        RateLimitRuleConfig {
            name: name.to_string(),
            key_type: KeyType::Ip,
            algorithm: Algorithm::FixedWindow,
            limit,
            window: 60,
            burst: None,
            routes: routes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn rule_scoped_to_other_routes_does_not_apply() {
        let evaluator = RateLimitEvaluator::new(
            RateLimitStore::new(Arc::new(InMemoryStateStore::new())),
            FailMode::Open,
        );
        let rules = vec![rule("r1", 1, &["other-route"])];
        let ctx = KeyContext {
            client_ip: "1.2.3.4",
            user_id: None,
            authenticated: false,
            route_id: Some("this-route"),
        };
        let decision = evaluator.evaluate(&ctx, &rules, Some("this-route")).await;
        assert!(matches!(decision, RateLimitDecision::NoRulesApplied));
    }

    #[tokio::test]
    async fn global_rule_denies_once_exhausted() {
        let evaluator = RateLimitEvaluator::new(
            RateLimitStore::new(Arc::new(InMemoryStateStore::new())),
            FailMode::Open,
        );
        let rules = vec![rule("r1", 1, &[])];
        let ctx = KeyContext {
            client_ip: "1.2.3.4",
            user_id: None,
            authenticated: false,
            route_id: Some("this-route"),
        };
        let first = evaluator.evaluate(&ctx, &rules, Some("this-route")).await;
        assert!(matches!(first, RateLimitDecision::Allowed { .. }));
        let second = evaluator.evaluate(&ctx, &rules, Some("this-route")).await;
        assert!(matches!(second, RateLimitDecision::Denied { .. }));
    }
}
