//! Upstream selection policies.
//!
//! A [`LoadBalancer`] is owned by exactly one backend and picks one healthy
//! [`Upstream`] per request. The [`Algorithm`] is fixed at construction;
//! changing it means building a new balancer.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::upstream::Upstream;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    Random,
}

impl Algorithm {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown load balancing algorithm '{0}' (expected round_robin or random)")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct LoadBalancer {
    algorithm: Algorithm,
    counter: AtomicUsize,
}

impl LoadBalancer {
    #[must_use]
    pub const fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            counter: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Pick a healthy upstream. `None` means no upstream is healthy
    /// (including the empty list).
    #[must_use]
    pub fn select<'a>(&self, upstreams: &'a [Arc<Upstream>]) -> Option<&'a Arc<Upstream>> {
        if upstreams.is_empty() {
            return None;
        }

        match self.algorithm {
            Algorithm::RoundRobin => self.round_robin(upstreams),
            Algorithm::Random => Self::random(upstreams),
        }
    }

    fn round_robin<'a>(&self, upstreams: &'a [Arc<Upstream>]) -> Option<&'a Arc<Upstream>> {
        // The counter moves on every attempt, healthy or not, so concurrent
        // callers spread over the list instead of piling onto one dead index.
        for _ in 0..upstreams.len() {
            let idx = self.counter.fetch_add(1, Ordering::Relaxed) % upstreams.len();
            let candidate = &upstreams[idx];
            if candidate.is_healthy() {
                return Some(candidate);
            }
        }
        None
    }

    fn random(upstreams: &[Arc<Upstream>]) -> Option<&Arc<Upstream>> {
        let idx = rand::thread_rng().gen_range(0..upstreams.len());
        let candidate = &upstreams[idx];
        if candidate.is_healthy() {
            return Some(candidate);
        }

        upstreams.iter().find(|u| u.is_healthy())
    }
}
