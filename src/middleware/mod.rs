//! Per-request middleware pipeline.
//!
//! Each backend owns a [`Pipeline`]: an ordered list of [`Middleware`]
//! steps that run after upstream selection and before the request is
//! proxied. A step returns [`Flow::Continue`] to pass control on, or
//! [`Flow::Stop`] with a terminal response, which ends the chain and is
//! returned to the client as-is.
//!
//! Every pipeline starts with [`tagging::RequestTagging`] and
//! [`method::MethodAdmission`]; services with `jwt_required` also get
//! [`auth::BearerAuth`].

pub mod auth;
pub mod method;
pub mod tagging;

use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use axum::response::Response;

use crate::config::model::{Config, ServiceConfig};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub enum Flow {
    Continue,
    Stop(Response),
}

/// What a step can see and change.
pub struct MiddlewareContext<'a> {
    pub config: &'a Config,
    pub service: &'a ServiceConfig,
    pub method: &'a Method,
    /// Path that will be forwarded (after stripping).
    pub path: &'a str,
    pub request_headers: &'a mut HeaderMap,
    pub response_headers: &'a mut HeaderMap,
}

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;
    fn handle(&self, ctx: &mut MiddlewareContext<'_>) -> Flow;
}

#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Pipeline {
    /// The built-in steps every service runs, plus bearer auth when required.
    #[must_use]
    pub fn for_service(service: &ServiceConfig) -> Self {
        let mut pipeline = Self::default();
        pipeline.push(tagging::RequestTagging);
        pipeline.push(method::MethodAdmission);
        if service.jwt_required {
            pipeline.push(auth::BearerAuth);
        }
        pipeline
    }

    pub fn push(&mut self, step: impl Middleware + 'static) {
        self.steps.push(Arc::new(step));
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run steps in order until one stops.
    pub fn run(&self, ctx: &mut MiddlewareContext<'_>) -> Flow {
        for step in &self.steps {
            if let Flow::Stop(response) = step.handle(ctx) {
                tracing::debug!(
                    middleware = step.name(),
                    service = ctx.service.key(),
                    status = response.status().as_u16(),
                    "middleware stopped the pipeline"
                );
                return Flow::Stop(response);
            }
        }
        Flow::Continue
    }
}
