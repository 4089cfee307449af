//! Loopback upstreams and gateway listeners shared by the integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use portico::config::model::{Config, ServiceConfig, UpstreamConfig};
use portico::gateway::Gateway;
use portico::server;
use serde::Deserialize;
use tokio::sync::{oneshot, watch};

struct EchoState {
    name: &'static str,
    hits: AtomicUsize,
    status: AtomicU16,
    delay: Duration,
}

/// What the echo upstream saw, returned as its JSON body.
#[derive(Debug, Deserialize)]
pub struct Echo {
    pub upstream: String,
    pub method: String,
    pub uri: String,
    pub headers: std::collections::HashMap<String, String>,
    pub body: String,
}

pub struct TestUpstream {
    pub addr: SocketAddr,
    state: Arc<EchoState>,
    _shutdown: oneshot::Sender<()>,
}

impl TestUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }
}

async fn echo(
    State(state): State<Arc<EchoState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let status =
        StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK);
    let headers: std::collections::HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
        .collect();
    let payload = serde_json::json!({
        "upstream": state.name,
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": headers,
        "body": body,
    });
    (status, Json(payload)).into_response()
}

pub async fn spawn_upstream(name: &'static str) -> TestUpstream {
    spawn_upstream_with_delay(name, Duration::ZERO).await
}

pub async fn spawn_upstream_with_delay(name: &'static str, delay: Duration) -> TestUpstream {
    let state = Arc::new(EchoState {
        name,
        hits: AtomicUsize::new(0),
        status: AtomicU16::new(200),
        delay,
    });
    let router = Router::new()
        .fallback(echo)
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    TestUpstream {
        addr,
        state,
        _shutdown: tx,
    }
}

/// A loopback address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn service(path: &str, methods: &[&str], strip_path: bool, urls: &[String]) -> ServiceConfig {
    ServiceConfig {
        path: path.into(),
        methods: methods.iter().map(|m| (*m).to_string()).collect(),
        strip_path,
        algorithm: None,
        jwt_required: false,
        upstreams: urls
            .iter()
            .map(|url| UpstreamConfig { url: url.clone() })
            .collect(),
    }
}

/// Config with probing off, so every upstream starts healthy.
pub fn config(services: Vec<ServiceConfig>) -> Config {
    let mut config = Config {
        services,
        ..Config::default()
    };
    config.health_check.enabled = false;
    config
}

pub struct TestGateway {
    pub gateway: Arc<Gateway>,
    pub proxy: SocketAddr,
    pub admin: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl TestGateway {
    pub fn proxy_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.proxy)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.admin)
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Poll the audit log until it holds at least `n` lines.
    pub async fn audit_lines(&self, n: usize) -> Vec<String> {
        for _ in 0..200 {
            self.gateway.audit().flush().await;
            let log = self.gateway.read_audit_log().await.unwrap();
            let lines: Vec<String> = log.lines().map(String::from).collect();
            if lines.len() >= n {
                return lines;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("audit log never reached {n} lines");
    }
}

pub async fn start_gateway(config: Config) -> TestGateway {
    let gateway = Arc::new(Gateway::new(config).unwrap());
    let (shutdown, rx) = watch::channel(false);

    let proxy_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy = proxy_listener.local_addr().unwrap();
    let proxy_router = server::build_router(Arc::clone(&gateway));
    let mut proxy_rx = rx.clone();
    tokio::spawn(async move {
        axum::serve(
            proxy_listener,
            proxy_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = proxy_rx.wait_for(|stop| *stop).await;
        })
        .await
        .unwrap();
    });

    let admin_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin = admin_listener.local_addr().unwrap();
    let admin_router = server::build_admin_router(Arc::clone(&gateway));
    let mut admin_rx = rx;
    tokio::spawn(async move {
        axum::serve(admin_listener, admin_router)
            .with_graceful_shutdown(async move {
                let _ = admin_rx.wait_for(|stop| *stop).await;
            })
            .await
            .unwrap();
    });

    TestGateway {
        gateway,
        proxy,
        admin,
        shutdown,
    }
}
