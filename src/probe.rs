//! Upstream liveness checks.
//!
//! [`HealthProber`] sends `HEAD` to an upstream's base URL with a short
//! timeout. Any status in `200..400` counts as healthy; errors, timeouts and
//! statuses `>= 400` count as unhealthy. Each [`Upstream`](crate::upstream::Upstream)
//! runs its own loop over a clone of the prober.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::Method;
use url::Url;

use crate::config::model::HealthCheckConfig;
use crate::server::HttpClient;

#[derive(Clone)]
pub struct HealthProber {
    client: HttpClient,
    interval: Duration,
    timeout: Duration,
}

impl std::fmt::Debug for HealthProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProber")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HealthProber {
    #[must_use]
    pub const fn new(client: HttpClient, interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            interval,
            timeout,
        }
    }

    /// Build a prober from config, or `None` when probing is disabled.
    #[must_use]
    pub fn from_config(client: HttpClient, config: &HealthCheckConfig) -> Option<Self> {
        config.enabled.then(|| {
            Self::new(
                client,
                Duration::from_secs(config.interval_secs),
                Duration::from_millis(config.timeout_ms),
            )
        })
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// One liveness check. Never fails; an error is an unhealthy result.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn check(&self, url: &Url) -> bool {
        let req = match hyper::Request::builder()
            .method(Method::HEAD)
            .uri(url.as_str())
            .body(Full::new(Bytes::new()))
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(upstream = %url, error = %e, "cannot build health probe");
                return false;
            }
        };

        match tokio::time::timeout(self.timeout, self.client.request(req)).await {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                let healthy = (200..400).contains(&status);
                if !healthy {
                    tracing::debug!(upstream = %url, status, "health probe rejected");
                }
                healthy
            }
            Ok(Err(e)) => {
                tracing::debug!(upstream = %url, error = %e, "health probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(upstream = %url, timeout_ms = self.timeout.as_millis() as u64, "health probe timed out");
                false
            }
        }
    }
}
