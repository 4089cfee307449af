//! Header construction, forwarding, and hop-by-hop stripping.
//!
//! [`build_forwarded_headers`] clones the client headers (after the
//! middleware pipeline has run), strips hop-by-hop headers, rewrites
//! `Host`, and adds proxy metadata (`X-Forwarded-For`, `X-Real-IP`,
//! `X-Forwarded-Proto`, `X-Forwarded-Host`, `Via`).

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::model::ProxyConfig;

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

const VIA: &str = "1.1 portico";

/// Strip hop-by-hop headers from an upstream response.
///
/// The body is streamed through unchanged, so the origin's
/// `content-length` stays valid and is kept.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    target_url: &url::Url,
    proxy: &ProxyConfig,
) -> HeaderMap {
    let mut headers = original.clone();

    if proxy.strip_hop_by_hop {
        for header_name in HOP_BY_HOP.iter() {
            headers.remove(header_name);
        }
    }

    // Rewrite Host
    if let Some(host) = target_url.host_str() {
        let host_value = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        if let Ok(val) = HeaderValue::from_str(&host_value) {
            headers.insert("host", val);
        }
    }

    if !proxy.proxy_headers {
        return headers;
    }

    // X-Forwarded-For: append to chain
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.to_string(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    // X-Real-IP (first IP in chain)
    let real_ip = xff.split(',').next().unwrap_or(client_ip).trim();
    if let Ok(val) = HeaderValue::from_str(real_ip) {
        headers.insert("x-real-ip", val);
    }

    let proto = if target_url.scheme() == "https" {
        "https"
    } else {
        "http"
    };
    headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));

    // X-Forwarded-Host (original Host the client targeted)
    if let Some(original_host) = original.get("host") {
        headers.insert("x-forwarded-host", original_host.clone());
    }

    headers.insert("via", HeaderValue::from_static(VIA));

    headers
}
