//! The running gateway: registry, audit logger, HTTP client and stats.
//!
//! [`Gateway`] is shared as `Arc<Gateway>` by both listeners. Request
//! handling only reads from it; the admin operations here mutate the
//! registry through its copy-on-write API, so they never block traffic
//! to other services.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::audit::AuditLogger;
use crate::config::model::{Config, ServiceConfig};
use crate::config::validation;
use crate::config::ConfigVersion;
use crate::error::{AuditError, GatewayError, RegistryError};
use crate::probe::HealthProber;
use crate::registry::{Backend, BackendRegistry};
use crate::server::{self, HttpClient, Stats};
use crate::upstream::Upstream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamStatus {
    pub url: String,
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub service: String,
    pub algorithm: String,
    pub methods: Vec<String>,
    pub strip_path: bool,
    pub jwt_required: bool,
    pub middleware: Vec<String>,
    pub upstreams: Vec<UpstreamStatus>,
}

pub struct Gateway {
    config: Config,
    config_source: String,
    config_version: Option<ConfigVersion>,
    registry: BackendRegistry,
    audit: AuditLogger,
    http_client: HttpClient,
    prober: Option<HealthProber>,
    stats: Stats,
    start_time: Instant,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config_source", &self.config_source)
            .field("services", &self.registry.keys())
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Validate the config, start the audit logger and register every
    /// configured service (starting its probes).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        validation::validate(&config).map_err(|errors| GatewayError::ConfigValidation { errors })?;

        let http_client = server::build_http_client();
        let prober = HealthProber::from_config(http_client.clone(), &config.health_check);
        let audit = AuditLogger::start(&config.logging)?;

        let gateway = Self {
            config,
            config_source: "inline".into(),
            config_version: None,
            registry: BackendRegistry::new(),
            audit,
            http_client,
            prober,
            stats: Stats::new(),
            start_time: Instant::now(),
        };

        for service in &gateway.config.services {
            gateway.register_service(service.clone())?;
        }

        Ok(gateway)
    }

    /// Record where the config came from, for the health endpoint.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>, version: ConfigVersion) -> Self {
        self.config_source = source.into();
        self.config_version = Some(version);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_source(&self) -> &str {
        &self.config_source
    }

    #[must_use]
    pub const fn config_version(&self) -> Option<&ConfigVersion> {
        self.config_version.as_ref()
    }

    #[must_use]
    pub const fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    #[must_use]
    pub const fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    #[must_use]
    pub const fn stats(&self) -> &Stats {
        &self.stats
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Register (or replace) a service. Returns whether one was replaced.
    pub fn register_service(&self, service: ServiceConfig) -> Result<bool, RegistryError> {
        let errors = validation::validate_service(&service, &format!("service {}", service.key()));
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(RegistryError::InvalidService(messages.join("; ")));
        }
        if service.jwt_required && !self.has_jwt_secret() {
            return Err(RegistryError::InvalidService(
                "jwt_required needs jwt.secret_key to be configured".into(),
            ));
        }

        let upstreams = service
            .upstreams
            .iter()
            .map(|u| parse_upstream(&u.url).map(|url| self.spawn_upstream(url)))
            .collect::<Result<Vec<_>, _>>()?;

        let key = service.key().to_string();
        let algorithm = self.config.algorithm_for(&service);
        let count = upstreams.len();
        let replaced = self
            .registry
            .put(Backend::new(service, algorithm, upstreams))
            .is_some();

        tracing::info!(
            service = %key,
            upstreams = count,
            algorithm = %algorithm,
            replaced,
            "service registered"
        );
        Ok(replaced)
    }

    pub fn deregister_service(&self, service: &str) -> Result<(), RegistryError> {
        self.registry
            .remove(service)
            .ok_or_else(|| RegistryError::ServiceNotFound(service.to_string()))?;
        tracing::info!(service = %service, "service deregistered");
        Ok(())
    }

    #[must_use]
    pub fn services(&self) -> Vec<String> {
        self.registry.keys()
    }

    #[must_use]
    pub fn describe_services(&self) -> Vec<ServiceSummary> {
        self.registry
            .keys()
            .into_iter()
            .filter_map(|key| self.registry.resolve(&key))
            .map(|backend| {
                let service = backend.service();
                ServiceSummary {
                    service: backend.key().to_string(),
                    algorithm: backend.balancer().algorithm().to_string(),
                    methods: service.methods.clone(),
                    strip_path: service.strip_path,
                    jwt_required: service.jwt_required,
                    middleware: backend
                        .pipeline()
                        .names()
                        .into_iter()
                        .map(String::from)
                        .collect(),
                    upstreams: backend
                        .upstreams()
                        .iter()
                        .map(|u| UpstreamStatus {
                            url: u.url().to_string(),
                            healthy: u.is_healthy(),
                        })
                        .collect(),
                }
            })
            .collect()
    }

    pub fn add_upstream(&self, service: &str, url: &str) -> Result<(), RegistryError> {
        let parsed = parse_upstream(url)?;
        self.registry.mutate_upstreams(service, |list| {
            if list.iter().any(|u| u.url() == &parsed) {
                return Err(RegistryError::UpstreamExists {
                    service: service.to_string(),
                    url: parsed.to_string(),
                });
            }
            list.push(Arc::new(self.spawn_upstream(parsed)));
            Ok(())
        })?;
        tracing::info!(service = %service, upstream = %url, "upstream added");
        Ok(())
    }

    pub fn remove_upstream(&self, service: &str, url: &str) -> Result<(), RegistryError> {
        let wanted = Url::parse(url).ok();
        self.registry.mutate_upstreams(service, |list| {
            let idx = position(list, wanted.as_ref()).ok_or_else(|| {
                RegistryError::UpstreamNotFound {
                    service: service.to_string(),
                    url: url.to_string(),
                }
            })?;
            list.remove(idx);
            Ok(())
        })?;
        tracing::info!(service = %service, upstream = %url, "upstream removed");
        Ok(())
    }

    /// Swap `old_url` for `new_url` in place, keeping its position.
    pub fn replace_upstream(
        &self,
        service: &str,
        old_url: &str,
        new_url: &str,
    ) -> Result<(), RegistryError> {
        let replacement = parse_upstream(new_url)?;
        let wanted = Url::parse(old_url).ok();
        self.registry.mutate_upstreams(service, |list| {
            let idx = position(list, wanted.as_ref()).ok_or_else(|| {
                RegistryError::UpstreamNotFound {
                    service: service.to_string(),
                    url: old_url.to_string(),
                }
            })?;
            let clash = list
                .iter()
                .enumerate()
                .any(|(i, u)| i != idx && u.url() == &replacement);
            if clash {
                return Err(RegistryError::UpstreamExists {
                    service: service.to_string(),
                    url: replacement.to_string(),
                });
            }
            list[idx] = Arc::new(self.spawn_upstream(replacement));
            Ok(())
        })?;
        tracing::info!(service = %service, old = %old_url, new = %new_url, "upstream replaced");
        Ok(())
    }

    /// Upstream URLs of a service, in order.
    pub fn list_upstreams(&self, service: &str) -> Result<Vec<String>, RegistryError> {
        let backend = self
            .registry
            .resolve(service)
            .ok_or_else(|| RegistryError::ServiceNotFound(service.to_string()))?;
        Ok(backend
            .upstreams()
            .iter()
            .map(|u| u.url().to_string())
            .collect())
    }

    pub async fn read_audit_log(&self) -> Result<String, AuditError> {
        self.audit.read_all().await
    }

    /// Stop every probe and wait for queued audit entries to be written.
    pub async fn shutdown(&self) {
        self.registry.clear();
        self.audit.flush().await;
        tracing::info!(audit = ?self.audit.stats(), "gateway stopped");
    }

    fn has_jwt_secret(&self) -> bool {
        self.config
            .jwt
            .secret_key
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }

    fn spawn_upstream(&self, url: Url) -> Upstream {
        match &self.prober {
            Some(prober) => Upstream::spawn(url, prober),
            None => {
                let upstream = Upstream::unprobed(url);
                upstream.set_healthy(true);
                upstream
            }
        }
    }
}

fn parse_upstream(url: &str) -> Result<Url, RegistryError> {
    validation::validate_upstream_url(url).map_err(|reason| RegistryError::InvalidUpstreamUrl {
        url: url.to_string(),
        reason,
    })
}

fn position(list: &[Arc<Upstream>], wanted: Option<&Url>) -> Option<usize> {
    let wanted = wanted?;
    list.iter().position(|u| u.url() == wanted)
}
