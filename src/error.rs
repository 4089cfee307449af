//! Error types for Portico.
//!
//! [`GatewayError`] covers startup and CLI failures (config loading,
//! binding, I/O). [`DispatchError`] is the request-path error surfaced to
//! clients, [`RegistryError`] the admin-path error, and [`AuditError`] the
//! audit log read error. The last three render as JSON bodies with an
//! explicit HTTP status.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub scope: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.scope, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Cannot open audit log {}: {source}", path.display())]
    AuditLogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

fn json_error(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(ErrorBody { code, message })).into_response()
}

/// Terminal failures of a proxied request. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    #[error("method {method} not allowed for service '{service}'")]
    MethodNotAllowed { service: String, method: String },

    #[error("missing bearer credential")]
    Unauthorized,

    #[error("no healthy upstream for service '{0}'")]
    NoHealthyUpstream(String),

    #[error("upstream {upstream} unreachable: {reason}")]
    UpstreamUnreachable { upstream: String, reason: String },

    #[error("upstream {0} timed out")]
    UpstreamTimeout(String),
}

impl DispatchError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoHealthyUpstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "invalid_path",
            Self::ServiceNotFound(_) => "service_not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::Unauthorized => "unauthorized",
            Self::NoHealthyUpstream(_) => "no_healthy_upstream",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::UpstreamTimeout(_) => "upstream_timeout",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        json_error(self.status(), self.code(), self.to_string())
    }
}

/// Failures of administrative registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    #[error("upstream {url} not registered for service '{service}'")]
    UpstreamNotFound { service: String, url: String },

    #[error("upstream {url} already registered for service '{service}'")]
    UpstreamExists { service: String, url: String },

    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("invalid service: {0}")]
    InvalidService(String),
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::ServiceNotFound(_) => (StatusCode::NOT_FOUND, "service_not_found"),
            Self::UpstreamNotFound { .. } => (StatusCode::NOT_FOUND, "upstream_not_found"),
            Self::UpstreamExists { .. } => (StatusCode::CONFLICT, "upstream_exists"),
            Self::InvalidUpstreamUrl { .. } => (StatusCode::BAD_REQUEST, "invalid_upstream_url"),
            Self::InvalidService(_) => (StatusCode::BAD_REQUEST, "invalid_service"),
        };
        json_error(status, code, self.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log is not configured")]
    Unavailable,

    #[error("failed to read audit log: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "audit_unavailable"),
            Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "audit_read_failed"),
        };
        json_error(status, code, self.to_string())
    }
}
