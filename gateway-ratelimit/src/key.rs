use gateway_core::config::KeyType;

/// Everything the key generator needs to know about a request, decoupled
/// from [`gateway_core::RequestContext`] so this crate doesn't have to
/// depend on the router/identity types it doesn't otherwise touch.
pub struct KeyContext<'a> {
    pub client_ip: &'a str,
    pub user_id: Option<&'a str>,
    pub authenticated: bool,
    pub route_id: Option<&'a str>,
}

fn route_id_or_unknown(ctx: &KeyContext) -> &str {
    ctx.route_id.unwrap_or("unknown")
}

/// Builds the store key for a rule, dispatching on its configured
/// [`KeyType`]. `user` falls back to an IP-based key when the request
/// isn't authenticated, same as `composite`'s user half.
pub fn generate_key(ctx: &KeyContext, rule_name: &str, key_type: KeyType) -> String {
    match key_type {
        KeyType::Ip => ip_key(ctx, rule_name),
        KeyType::User => {
            if ctx.authenticated {
                if let Some(user_id) = ctx.user_id {
                    return format!("user:{user_id}:{rule_name}");
                }
            }
            ip_key(ctx, rule_name)
        }
        KeyType::Route => format!("route:{}:{}", route_id_or_unknown(ctx), rule_name),
        KeyType::Composite => {
            let subject = if ctx.authenticated {
                ctx.user_id.map(|id| format!("user:{id}"))
            } else {
                None
            }
            .unwrap_or_else(|| format!("ip:{}", ctx.client_ip));
            format!("{subject}:route:{}:{rule_name}", route_id_or_unknown(ctx))
        }
    }
}

fn ip_key(ctx: &KeyContext, rule_name: &str) -> String {
    format!("ip:{}:{rule_name}", ctx.client_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(client_ip: &'a str, user_id: Option<&'a str>, authenticated: bool, route_id: Option<&'a str>) -> KeyContext<'a> {
        KeyContext { client_ip, user_id, authenticated, route_id }
    }

    #[test]
    fn ip_key_is_ip_and_rule() {
        let c = ctx("1.2.3.4", None, false, None);
        assert_eq!(generate_key(&c, "login", KeyType::Ip), "ip:1.2.3.4:login");
    }

    #[test]
    fn user_key_falls_back_to_ip_when_unauthenticated() {
        let c = ctx("1.2.3.4", None, false, None);
        assert_eq!(generate_key(&c, "login", KeyType::User), "ip:1.2.3.4:login");
    }

    #[test]
    fn user_key_uses_user_id_when_authenticated() {
        let c = ctx("1.2.3.4", Some("u1"), true, None);
        assert_eq!(generate_key(&c, "login", KeyType::User), "user:u1:login");
    }

    #[test]
    fn route_key_defaults_to_unknown() {
        let c = ctx("1.2.3.4", None, false, None);
        assert_eq!(generate_key(&c, "login", KeyType::Route), "route:unknown:login");
    }

    #[test]
    fn composite_key_combines_subject_and_route() {
        let c = ctx("1.2.3.4", Some("u1"), true, Some("r1"));
        assert_eq!(
            generate_key(&c, "login", KeyType::Composite),
            "user:u1:route:r1:login"
        );
    }
}
