//! A single backend server instance and its health flag.
//!
//! The flag is written only by the upstream's own probe task (see
//! [`HealthProber`]); request handling only reads it. The probe task is
//! aborted by [`Upstream::shutdown`] or when the upstream is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

use crate::probe::HealthProber;

#[derive(Debug)]
pub struct Upstream {
    url: Url,
    healthy: Arc<AtomicBool>,
    probe: Option<AbortHandle>,
}

impl Upstream {
    /// An upstream with no probe task. Starts unhealthy.
    #[must_use]
    pub fn unprobed(url: Url) -> Self {
        Self {
            url,
            healthy: Arc::new(AtomicBool::new(false)),
            probe: None,
        }
    }

    /// Create an upstream and start its periodic probe task.
    ///
    /// Must be called from within a Tokio runtime. The first probe runs
    /// immediately; until it completes the upstream reports unhealthy.
    #[must_use]
    pub fn spawn(url: Url, prober: &HealthProber) -> Self {
        let healthy = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(probe_loop(url.clone(), Arc::clone(&healthy), prober.clone()));
        Self {
            url,
            healthy,
            probe: Some(task.abort_handle()),
        }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Override the health flag. Used when probing is disabled and by tests.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    /// Run one probe now and record the result.
    pub async fn probe(&self, prober: &HealthProber) -> bool {
        let ok = prober.check(&self.url).await;
        record(&self.url, &self.healthy, ok);
        ok
    }

    #[must_use]
    pub fn is_probing(&self) -> bool {
        self.probe.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the probe task. Idempotent.
    pub fn shutdown(&self) {
        if let Some(handle) = &self.probe {
            if !handle.is_finished() {
                handle.abort();
                tracing::debug!(upstream = %self.url, "health probe stopped");
            }
        }
    }
}

impl Drop for Upstream {
    fn drop(&mut self) {
        if let Some(handle) = &self.probe {
            handle.abort();
        }
    }
}

async fn probe_loop(url: Url, healthy: Arc<AtomicBool>, prober: HealthProber) {
    let mut ticker = tokio::time::interval(prober.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let ok = prober.check(&url).await;
        record(&url, &healthy, ok);
    }
}

fn record(url: &Url, healthy: &AtomicBool, ok: bool) {
    let was = healthy.swap(ok, Ordering::AcqRel);
    if was != ok {
        if ok {
            tracing::info!(upstream = %url, "upstream is healthy");
        } else {
            tracing::warn!(upstream = %url, "upstream is unhealthy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprobed_upstream_starts_unhealthy() {
        let upstream = Upstream::unprobed(Url::parse("http://localhost:1").unwrap());
        assert!(!upstream.is_healthy());
        assert!(!upstream.is_probing());

        upstream.set_healthy(true);
        assert!(upstream.is_healthy());

        // no task to stop
        upstream.shutdown();
    }
}
