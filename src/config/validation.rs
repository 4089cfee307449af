//! Configuration validation with detailed error reporting.
//!
//! [`validate`] checks a parsed [`Config`] for structural errors such as
//! malformed or duplicate service paths, bad HTTP methods, malformed or
//! duplicate upstream URLs, zero-sized worker pools, and JWT-protected
//! services without a secret. All problems are collected and returned at
//! once as [`ValidationError`] values with per-field suggestions.

use std::collections::HashSet;

use url::Url;

use super::model::{Config, ServiceConfig};
use crate::error::ValidationError;

pub const VALID_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "*",
];

/// Validate a service path. It must name exactly one path segment.
pub fn validate_service_path(path: &str) -> Result<(), String> {
    let key = path.trim_matches('/');
    if key.is_empty() {
        return Err("path cannot be empty".into());
    }
    if key.contains('/') {
        return Err(format!("'{path}' must be a single path segment"));
    }
    Ok(())
}

/// Validate an upstream URL. Returns the parsed URL or a human-readable error.
pub fn validate_upstream_url(url: &str) -> Result<Url, String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else {
                Ok(parsed)
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Validate an HTTP method string. Returns `Ok(())` or a human-readable error.
pub fn validate_method(method: &str) -> Result<(), String> {
    let upper = method.to_uppercase();
    if VALID_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(format!("'{method}' is not a valid HTTP method"))
    }
}

/// Validate one service in isolation (used for admin registration too).
pub fn validate_service(service: &ServiceConfig, scope: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(msg) = validate_service_path(&service.path) {
        let key = service.path.trim_matches('/');
        errors.push(ValidationError {
            scope: scope.to_string(),
            field: "path".into(),
            message: msg,
            suggestion: key
                .split('/')
                .find(|s| !s.is_empty())
                .map(|first| format!("did you mean '{first}'?")),
        });
    }

    if service.methods.is_empty() {
        errors.push(ValidationError {
            scope: scope.to_string(),
            field: "methods".into(),
            message: "at least one method must be allowed".into(),
            suggestion: Some("use [\"*\"] to allow every method".into()),
        });
    }

    for method in &service.methods {
        if let Err(msg) = validate_method(method) {
            errors.push(ValidationError {
                scope: scope.to_string(),
                field: "methods".into(),
                message: msg,
                suggestion: None,
            });
        }
    }

    let mut seen_urls = HashSet::new();
    for upstream in &service.upstreams {
        match validate_upstream_url(&upstream.url) {
            Ok(parsed) => {
                if !seen_urls.insert(parsed) {
                    errors.push(ValidationError {
                        scope: scope.to_string(),
                        field: "upstreams.url".into(),
                        message: format!("duplicate upstream '{}'", upstream.url),
                        suggestion: None,
                    });
                }
            }
            Err(msg) => errors.push(ValidationError {
                scope: scope.to_string(),
                field: "upstreams.url".into(),
                message: msg,
                suggestion: None,
            }),
        }
    }

    errors
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.logging.max_writers == 0 {
        errors.push(root_error("logging.max_writers", "must be at least 1"));
    }
    if config.logging.queue_capacity == 0 {
        errors.push(root_error("logging.queue_capacity", "must be at least 1"));
    }
    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(root_error("health_check.interval_secs", "must be at least 1"));
    }
    if config.health_check.enabled && config.health_check.timeout_ms == 0 {
        errors.push(root_error("health_check.timeout_ms", "must be at least 1"));
    }
    if config.server.port == config.server.admin_port {
        errors.push(ValidationError {
            scope: "(root)".into(),
            field: "server.admin_port".into(),
            message: "admin port must differ from the proxy port".into(),
            suggestion: None,
        });
    }

    let has_secret = config
        .jwt
        .secret_key
        .as_deref()
        .is_some_and(|s| !s.is_empty());
    let mut seen_keys = HashSet::new();

    for (i, service) in config.services.iter().enumerate() {
        let scope = if service.key().is_empty() {
            format!("services[{i}]")
        } else {
            format!("service {}", service.key())
        };

        errors.extend(validate_service(service, &scope));

        if !service.key().is_empty() && !seen_keys.insert(service.key()) {
            errors.push(ValidationError {
                scope: scope.clone(),
                field: "path".into(),
                message: "duplicate service path".into(),
                suggestion: None,
            });
        }

        if service.jwt_required && !has_secret {
            errors.push(ValidationError {
                scope,
                field: "jwt_required".into(),
                message: "jwt.secret_key must be set when a service requires JWT".into(),
                suggestion: None,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn root_error(field: &str, message: &str) -> ValidationError {
    ValidationError {
        scope: "(root)".into(),
        field: field.into(),
        message: message.into(),
        suggestion: None,
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} services, {} upstreams\n",
        config.services.len(),
        config.total_upstreams()
    )];

    for service in &config.services {
        lines.push(format!(
            "  /{}  -> {} upstreams ({})",
            service.key(),
            service.upstreams.len(),
            config.algorithm_for(service),
        ));
        lines.push(format!("    methods: {}", service.methods.join(", ")));
        lines.push(format!("    strip_path: {}", service.strip_path));
        if service.jwt_required {
            lines.push("    jwt: required".into());
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{JwtConfig, UpstreamConfig};

    fn service(path: &str, urls: &[&str]) -> ServiceConfig {
        ServiceConfig {
            path: path.into(),
            methods: vec!["GET".into()],
            strip_path: false,
            algorithm: None,
            jwt_required: false,
            upstreams: urls
                .iter()
                .map(|u| UpstreamConfig { url: (*u).into() })
                .collect(),
        }
    }

    fn config_with(services: Vec<ServiceConfig>) -> Config {
        Config {
            services,
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = config_with(vec![service("/orders", &["http://localhost:8081"])]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn empty_services_is_allowed() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn multi_segment_path_suggests_first_segment() {
        let config = config_with(vec![service("/orders/v1", &["http://a:80"])]);
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.suggestion.as_deref() == Some("did you mean 'orders'?")));
    }

    #[test]
    fn duplicate_paths_fail_after_normalisation() {
        let config = config_with(vec![
            service("/orders", &["http://a:80"]),
            service("orders/", &["http://b:80"]),
        ]);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate service")));
    }

    #[test]
    fn invalid_url_fails() {
        let config = config_with(vec![service("/orders", &["not a url"])]);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("not a valid URL")));
    }

    #[test]
    fn unsupported_scheme_fails() {
        let config = config_with(vec![service("/orders", &["ftp://files:21"])]);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("unsupported scheme")));
    }

    #[test]
    fn duplicate_upstreams_fail() {
        let config = config_with(vec![service(
            "/orders",
            &["http://a:8080", "http://a:8080/"],
        )]);
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate upstream")));
    }

    #[test]
    fn invalid_method_fails() {
        let mut svc = service("/orders", &["http://a:80"]);
        svc.methods = vec!["FETCH".into()];
        let errors = validate(&config_with(vec![svc])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("not a valid HTTP method")));
    }

    #[test]
    fn jwt_required_without_secret_fails() {
        let mut svc = service("/orders", &["http://a:80"]);
        svc.jwt_required = true;
        let mut config = config_with(vec![svc]);
        assert!(validate(&config).is_err());

        config.jwt = JwtConfig {
            secret_key: Some("s3cret".into()),
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn zero_writers_fails() {
        let mut config = Config::default();
        config.logging.max_writers = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors[0].field, "logging.max_writers");
    }
}
