//! Rejects methods outside the service's allowed set with 403.

use axum::response::IntoResponse;

use super::{Flow, Middleware, MiddlewareContext};
use crate::error::DispatchError;

pub struct MethodAdmission;

impl Middleware for MethodAdmission {
    fn name(&self) -> &'static str {
        "method_admission"
    }

    fn handle(&self, ctx: &mut MiddlewareContext<'_>) -> Flow {
        if ctx.service.allows_method(ctx.method.as_str()) {
            return Flow::Continue;
        }

        Flow::Stop(
            DispatchError::MethodNotAllowed {
                service: ctx.service.key().to_string(),
                method: ctx.method.to_string(),
            }
            .into_response(),
        )
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, Method, StatusCode};

    use super::*;
    use crate::config::model::Config;
    use crate::middleware::test_support::service;

    fn admit(methods: &[&str], method: &Method) -> Flow {
        let config = Config::default();
        let svc = service(methods, false);
        let mut req_headers = HeaderMap::new();
        let mut resp_headers = HeaderMap::new();
        let mut ctx = MiddlewareContext {
            config: &config,
            service: &svc,
            method,
            path: "/",
            request_headers: &mut req_headers,
            response_headers: &mut resp_headers,
        };
        MethodAdmission.handle(&mut ctx)
    }

    #[test]
    fn allowed_method_continues() {
        assert!(matches!(admit(&["GET"], &Method::GET), Flow::Continue));
        assert!(matches!(admit(&["get"], &Method::GET), Flow::Continue));
    }

    #[test]
    fn wildcard_allows_everything() {
        assert!(matches!(admit(&["*"], &Method::DELETE), Flow::Continue));
    }

    #[test]
    fn disallowed_method_is_forbidden() {
        match admit(&["GET"], &Method::POST) {
            Flow::Stop(resp) => assert_eq!(resp.status(), StatusCode::FORBIDDEN),
            Flow::Continue => panic!("POST should be rejected"),
        }
    }
}
