//! Attaches a fresh correlation id to every request and its response.

use axum::http::HeaderValue;

use super::{Flow, Middleware, MiddlewareContext, REQUEST_ID_HEADER};

pub struct RequestTagging;

impl Middleware for RequestTagging {
    fn name(&self) -> &'static str {
        "request_tagging"
    }

    fn handle(&self, ctx: &mut MiddlewareContext<'_>) -> Flow {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            ctx.request_headers.insert(REQUEST_ID_HEADER, value.clone());
            ctx.response_headers.insert(REQUEST_ID_HEADER, value);
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, Method};

    use super::*;
    use crate::config::model::Config;
    use crate::middleware::test_support::service;

    #[test]
    fn tags_request_and_response_with_fresh_id() {
        let config = Config::default();
        let svc = service(&["*"], false);
        let mut req_headers = HeaderMap::new();
        req_headers.insert(REQUEST_ID_HEADER, "client-chosen".parse().unwrap());
        let mut resp_headers = HeaderMap::new();

        let mut ctx = MiddlewareContext {
            config: &config,
            service: &svc,
            method: &Method::GET,
            path: "/",
            request_headers: &mut req_headers,
            response_headers: &mut resp_headers,
        };
        assert!(matches!(RequestTagging.handle(&mut ctx), Flow::Continue));

        let id = req_headers.get(REQUEST_ID_HEADER).unwrap();
        assert_ne!(id, "client-chosen");
        assert_eq!(resp_headers.get(REQUEST_ID_HEADER), Some(id));
        assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }
}
