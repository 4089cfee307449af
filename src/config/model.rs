//! Serde data structures for the Portico configuration file.
//!
//! Contains [`Config`] (the root), [`ServiceConfig`], [`UpstreamConfig`]
//! and the gateway-wide sections. All types derive `Serialize` and
//! `Deserialize` with `deny_unknown_fields` for strict parsing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::balancer::Algorithm;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_admin_port() -> u16 {
    9090
}

const fn default_timeout() -> u64 {
    5000
}

const fn default_max_body() -> usize {
    1_048_576
}

const fn default_true() -> bool {
    true
}

const fn default_probe_interval() -> u64 {
    5
}

const fn default_probe_timeout() -> u64 {
    2000
}

const fn default_max_writers() -> usize {
    100
}

const fn default_queue_capacity() -> usize {
    1024
}

const fn default_max_body_capture() -> usize {
    64 * 1024
}

fn default_methods() -> Vec<String> {
    vec!["*".to_string()]
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub load_balancing: LoadBalancingConfig,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub jwt: JwtConfig,

    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl Config {
    #[must_use]
    pub fn total_upstreams(&self) -> usize {
        self.services.iter().map(|s| s.upstreams.len()).sum()
    }

    /// Algorithm for a service: its own setting, else the gateway default.
    #[must_use]
    pub fn algorithm_for(&self, service: &ServiceConfig) -> Algorithm {
        service.algorithm.unwrap_or(self.load_balancing.algorithm)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_port: default_admin_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Time allowed for an upstream to return response headers.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_body")]
    pub max_body: usize,

    #[serde(default = "default_true")]
    pub proxy_headers: bool,

    #[serde(default = "default_true")]
    pub strip_hop_by_hop: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            max_body: default_max_body(),
            proxy_headers: default_true(),
            strip_hop_by_hop: default_true(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoadBalancingConfig {
    #[serde(default)]
    pub algorithm: Algorithm,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckConfig {
    /// When disabled, upstreams are never probed and start healthy.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_probe_interval(),
            timeout_ms: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Audit log file. Audit logging is disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default = "default_max_writers")]
    pub max_writers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Bodies longer than this are truncated in audit entries.
    #[serde(default = "default_max_body_capture")]
    pub max_body_capture: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_writers: default_max_writers(),
            queue_capacity: default_queue_capacity(),
            max_body_capture: default_max_body_capture(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_origins: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_methods: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_headers: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JwtConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Routing key, the first path segment (`orders` or `/orders`).
    pub path: String,

    #[serde(default = "default_methods")]
    pub methods: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub strip_path: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub jwt_required: bool,

    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

impl ServiceConfig {
    /// The registry key: `path` without surrounding slashes.
    #[must_use]
    pub fn key(&self) -> &str {
        self.path.trim_matches('/')
    }

    #[must_use]
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods
            .iter()
            .any(|m| m == "*" || m.eq_ignore_ascii_case(method))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    pub url: String,
}
