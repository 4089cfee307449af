//! One audit record per request/response exchange.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use http::HeaderMap;
use serde::{Deserialize, Serialize};

pub type HeaderSnapshot = BTreeMap<String, Vec<String>>;

/// Serialised as a single JSON line in the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub service: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    pub request_headers: HeaderSnapshot,
    pub request_body: String,
    pub response_status: u16,
    pub response_headers: HeaderSnapshot,
    pub response_body: String,
    /// Set when either body was cut at the capture limit.
    #[serde(default)]
    pub truncated: bool,
}

impl AuditEntry {
    #[must_use]
    pub fn new(method: &str, path: &str) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self {
            timestamp_ms,
            method: method.to_string(),
            path: path.to_string(),
            ..Self::default()
        }
    }

    /// Record the inbound request headers and (possibly truncated) body.
    pub fn capture_request(&mut self, headers: &HeaderMap, body: &[u8], limit: usize) {
        self.request_headers = snapshot_headers(headers);
        let (text, truncated) = capture_body(body, limit);
        self.request_body = text;
        self.truncated |= truncated;
    }
}

/// Multi-valued header snapshot, keyed by lowercase name.
#[must_use]
pub fn snapshot_headers(headers: &HeaderMap) -> HeaderSnapshot {
    let mut out = HeaderSnapshot::new();
    for (name, value) in headers {
        out.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

/// Lossy UTF-8 of at most `limit` bytes, plus whether anything was cut.
#[must_use]
pub fn capture_body(body: &[u8], limit: usize) -> (String, bool) {
    let kept = &body[..body.len().min(limit)];
    (String::from_utf8_lossy(kept).into_owned(), body.len() > limit)
}
