//! `GET /health` on the admin listener.
//!
//! Returns a [`HealthResponse`] JSON payload with the build version,
//! uptime, config source metadata, service and upstream counts, request
//! counters and audit counters. Status is `degraded` while any registered
//! service has no healthy upstream.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::audit::AuditStatsSnapshot;
use crate::gateway::Gateway;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub upstreams: UpstreamHealth,
    pub stats: StatsResponse,
    pub audit: AuditHealth,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: Option<String>,
    pub services: usize,
}

#[derive(Serialize, Deserialize)]
pub struct UpstreamHealth {
    pub healthy: usize,
    pub total: usize,
    pub unavailable_services: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
}

#[derive(Serialize, Deserialize)]
pub struct AuditHealth {
    pub enabled: bool,
    #[serde(flatten)]
    pub counters: AuditStatsSnapshot,
}

pub async fn health_handler(State(gateway): State<Arc<Gateway>>) -> Json<HealthResponse> {
    let services = gateway.describe_services();
    let (healthy, total) = gateway.registry().upstream_counts();
    let unavailable_services: Vec<String> = services
        .iter()
        .filter(|s| !s.upstreams.iter().any(|u| u.healthy))
        .map(|s| s.service.clone())
        .collect();

    let status = if unavailable_services.is_empty() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: format!(
            "{} ({})",
            env!("PORTICO_GIT_SHORT"),
            env!("PORTICO_BUILD_PROFILE")
        ),
        uptime_seconds: gateway.uptime_seconds(),
        config: ConfigHealth {
            source: gateway.config_source().to_string(),
            version: gateway.config_version().map(|v| v.short().to_string()),
            services: services.len(),
        },
        upstreams: UpstreamHealth {
            healthy,
            total,
            unavailable_services,
        },
        stats: StatsResponse {
            requests_forwarded: gateway.stats().forwarded.load(Ordering::Relaxed),
            requests_failed: gateway.stats().failed.load(Ordering::Relaxed),
        },
        audit: AuditHealth {
            enabled: gateway.audit().is_enabled(),
            counters: gateway.audit().stats(),
        },
    })
}
