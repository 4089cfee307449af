//! Request dispatch: the proxy listener's only handler.
//!
//! [`forward_handler`] resolves `/{service}/{rest...}` to a backend, picks
//! a healthy upstream, runs the backend's middleware pipeline and proxies
//! the request in a single attempt, streaming the upstream body back.
//! Every response, errors included, carries the headers the pipeline
//! produced and is wrapped for audit recording.

pub mod headers;
pub mod path;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use http_body_util::Full;

use crate::audit::{self, AuditEntry};
use crate::error::DispatchError;
use crate::gateway::Gateway;
use crate::middleware::{Flow, MiddlewareContext, REQUEST_ID_HEADER};

/// Per-request state that outlives the dispatch attempt.
struct Exchange {
    entry: AuditEntry,
    response_headers: HeaderMap,
}

pub async fn forward_handler(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let audit = gateway.audit();

    let mut exchange = Exchange {
        entry: AuditEntry::new(method.as_str(), uri.path()),
        response_headers: HeaderMap::new(),
    };
    if audit.is_enabled() {
        exchange
            .entry
            .capture_request(&req_headers, &body, audit.max_body_capture());
    }

    let client_ip = addr.ip().to_string();
    let mut response = match dispatch(
        &gateway,
        &client_ip,
        &method,
        &uri,
        req_headers,
        body,
        &mut exchange,
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            gateway.stats().failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                method = %method,
                path = %uri.path(),
                service = %exchange.entry.service,
                code = e.code(),
                error = %e,
                "request failed"
            );
            e.into_response()
        }
    };

    for (name, value) in &exchange.response_headers {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    exchange.entry.request_id = exchange
        .response_headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    tracing::info!(
        correlation_id = exchange.entry.request_id.as_deref().unwrap_or("-"),
        method = %method,
        path = %uri.path(),
        service = %exchange.entry.service,
        upstream = exchange.entry.upstream.as_deref().unwrap_or("-"),
        status = response.status().as_u16(),
        latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "request completed"
    );

    audit::record(response, exchange.entry, audit)
}

async fn dispatch(
    gateway: &Gateway,
    client_ip: &str,
    method: &Method,
    uri: &Uri,
    mut req_headers: HeaderMap,
    body: Bytes,
    exchange: &mut Exchange,
) -> Result<Response, DispatchError> {
    let original_path = uri.path();
    let (key, rest) = path::split_service(original_path)?;
    exchange.entry.service = key.to_string();

    let backend = gateway
        .registry()
        .resolve(key)
        .ok_or_else(|| DispatchError::ServiceNotFound(key.to_string()))?;
    let upstream = backend
        .select_upstream()
        .ok_or_else(|| DispatchError::NoHealthyUpstream(key.to_string()))?;
    exchange.entry.upstream = Some(upstream.url().to_string());

    let service = backend.service();
    let forwarded_path = path::forwarded_path(original_path, rest, service.strip_path);

    let mut ctx = MiddlewareContext {
        config: gateway.config(),
        service,
        method,
        path: forwarded_path,
        request_headers: &mut req_headers,
        response_headers: &mut exchange.response_headers,
    };
    if let Flow::Stop(response) = backend.pipeline().run(&mut ctx) {
        gateway.stats().failed.fetch_add(1, Ordering::Relaxed);
        return Ok(response);
    }

    let proxy = &gateway.config().proxy;
    let target = path::target_uri(upstream.url(), forwarded_path, uri.query());
    let upstream_name = upstream.url().to_string();

    let mut builder = hyper::Request::builder()
        .method(method.clone())
        .uri(target.as_str());
    if let Some(h) = builder.headers_mut() {
        *h = headers::build_forwarded_headers(&req_headers, client_ip, upstream.url(), proxy);
    }
    let req = builder
        .body(Full::new(body))
        .map_err(|e| DispatchError::UpstreamUnreachable {
            upstream: upstream_name.clone(),
            reason: e.to_string(),
        })?;

    tracing::debug!(service = %key, upstream = %upstream_name, target = %target, "proxying request");

    let timeout = Duration::from_millis(proxy.timeout_ms);
    let response = match tokio::time::timeout(timeout, gateway.http_client().request(req)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            return Err(DispatchError::UpstreamUnreachable {
                upstream: upstream_name,
                reason: e.to_string(),
            })
        }
        Err(_) => return Err(DispatchError::UpstreamTimeout(upstream_name)),
    };

    gateway.stats().forwarded.fetch_add(1, Ordering::Relaxed);
    let (mut parts, body) = response.into_parts();
    headers::strip_response_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}
