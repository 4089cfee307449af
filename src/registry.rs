//! Concurrent service registry.
//!
//! [`BackendRegistry`] maps a routing key to an `Arc<Backend>`. The map is
//! sharded (`DashMap`), so registering or removing one service never blocks
//! lookups of another, and `resolve` hands out an `Arc` so no map lock is
//! held while a request is in flight.
//!
//! Each [`Backend`] keeps its upstream list as an immutable snapshot behind
//! an `ArcSwap`. Readers load the current snapshot without locking; writers
//! take the backend's own mutex, copy the list, edit the copy and swap it
//! in. A reader therefore sees either the old list or the new one, never a
//! partially edited one. Upstreams dropped from the list have their probe
//! tasks stopped.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::balancer::{Algorithm, LoadBalancer};
use crate::config::model::ServiceConfig;
use crate::error::RegistryError;
use crate::middleware::Pipeline;
use crate::upstream::Upstream;

pub type UpstreamList = Vec<Arc<Upstream>>;

#[derive(Debug)]
pub struct Backend {
    service: ServiceConfig,
    balancer: LoadBalancer,
    pipeline: Pipeline,
    upstreams: ArcSwap<UpstreamList>,
    write_lock: Mutex<()>,
}

impl Backend {
    #[must_use]
    pub fn new(service: ServiceConfig, algorithm: Algorithm, upstreams: Vec<Upstream>) -> Self {
        let pipeline = Pipeline::for_service(&service);
        Self {
            service,
            balancer: LoadBalancer::new(algorithm),
            pipeline,
            upstreams: ArcSwap::from_pointee(upstreams.into_iter().map(Arc::new).collect()),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.service.key()
    }

    /// Service settings as registered. The live upstream list is
    /// [`Backend::upstreams`], not `service().upstreams`.
    #[must_use]
    pub const fn service(&self) -> &ServiceConfig {
        &self.service
    }

    #[must_use]
    pub const fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Current upstream snapshot.
    #[must_use]
    pub fn upstreams(&self) -> Arc<UpstreamList> {
        self.upstreams.load_full()
    }

    /// Run the load balancer over the current snapshot.
    #[must_use]
    pub fn select_upstream(&self) -> Option<Arc<Upstream>> {
        let snapshot = self.upstreams.load();
        self.balancer.select(&snapshot).cloned()
    }

    /// Copy-on-write edit of the upstream list.
    ///
    /// `f` edits a private copy; on `Ok` the copy is published atomically,
    /// on `Err` nothing changes. Concurrent edits of the same backend are
    /// serialised.
    pub fn mutate_upstreams<T>(
        &self,
        f: impl FnOnce(&mut UpstreamList) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.upstreams.load_full();
        let mut next = current.as_ref().clone();
        let out = f(&mut next)?;

        let removed: Vec<&Arc<Upstream>> = current
            .iter()
            .filter(|old| !next.iter().any(|u| Arc::ptr_eq(u, old)))
            .collect();
        self.upstreams.store(Arc::new(next));
        for old in removed {
            old.shutdown();
        }

        Ok(out)
    }

    /// Stop every upstream's probe task.
    pub fn shutdown(&self) {
        for upstream in self.upstreams.load().iter() {
            upstream.shutdown();
        }
    }
}

#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: DashMap<String, Arc<Backend>>,
}

impl BackendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<Arc<Backend>> {
        self.backends.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Register a backend under its key, replacing any previous one.
    pub fn put(&self, backend: Backend) -> Option<Arc<Backend>> {
        let key = backend.key().to_string();
        let replaced = self.backends.insert(key, Arc::new(backend));
        if let Some(old) = &replaced {
            old.shutdown();
        }
        replaced
    }

    pub fn mutate_upstreams<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut UpstreamList) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let backend = self
            .resolve(key)
            .ok_or_else(|| RegistryError::ServiceNotFound(key.to_string()))?;
        backend.mutate_upstreams(f)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<Backend>> {
        let (_, backend) = self.backends.remove(key)?;
        backend.shutdown();
        Some(backend)
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.backends.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// `(healthy, total)` across every backend.
    #[must_use]
    pub fn upstream_counts(&self) -> (usize, usize) {
        self.backends.iter().fold((0, 0), |(healthy, total), entry| {
            let list = entry.value().upstreams();
            (
                healthy + list.iter().filter(|u| u.is_healthy()).count(),
                total + list.len(),
            )
        })
    }

    /// Remove every backend and stop all probes.
    pub fn clear(&self) {
        for key in self.keys() {
            self.remove(&key);
        }
    }
}
