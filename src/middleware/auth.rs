//! Bearer credential gate for services with `jwt_required`.
//!
//! Only checks that an `Authorization: Bearer <token>` header is present.
//! TODO: verify the token signature against `jwt.secret_key` and reject
//! expired tokens.

use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;

use super::{Flow, Middleware, MiddlewareContext};
use crate::error::DispatchError;

pub struct BearerAuth;

impl Middleware for BearerAuth {
    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    fn handle(&self, ctx: &mut MiddlewareContext<'_>) -> Flow {
        let has_token = ctx
            .request_headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| !token.trim().is_empty());

        if has_token {
            Flow::Continue
        } else {
            Flow::Stop(DispatchError::Unauthorized.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, Method, StatusCode};

    use super::*;
    use crate::config::model::Config;
    use crate::middleware::test_support::service;

    fn check(headers: &mut HeaderMap) -> Flow {
        let config = Config::default();
        let svc = service(&["*"], true);
        let mut resp_headers = HeaderMap::new();
        let mut ctx = MiddlewareContext {
            config: &config,
            service: &svc,
            method: &Method::GET,
            path: "/",
            request_headers: headers,
            response_headers: &mut resp_headers,
        };
        BearerAuth.handle(&mut ctx)
    }

    #[test]
    fn missing_token_is_unauthorized() {
        match check(&mut HeaderMap::new()) {
            Flow::Stop(resp) => assert_eq!(resp.status(), StatusCode::UNAUTHORIZED),
            Flow::Continue => panic!("expected rejection"),
        }
    }

    #[test]
    fn bearer_token_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert!(matches!(check(&mut headers), Flow::Continue));
    }
}
