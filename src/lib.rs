//! Portico is an HTTP reverse-proxy API gateway.
//!
//! A request to `/{service}/{rest...}` is routed to the backend registered
//! under `service`, sent through that backend's middleware pipeline and
//! proxied to one healthy upstream chosen by its load balancer. Upstreams
//! are probed in the background; every exchange can be recorded to an
//! append-only JSON-lines audit log.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Config file loading and validation.
//! - [`error`] -- Error types using `thiserror`.
//! - [`upstream`], [`probe`] -- Upstream instances and their health probes.
//! - [`balancer`] -- Round-robin and random selection over healthy upstreams.
//! - [`registry`] -- Concurrent service registry with copy-on-write upstream lists.
//! - [`middleware`] -- Per-backend request pipeline with short-circuit.
//! - [`proxy`] -- Request dispatch, path rewriting and forwarded headers.
//! - [`audit`] -- Bounded asynchronous audit logger.
//! - [`gateway`] -- The shared runtime state and admin operations.
//! - [`admin`], [`health`] -- Admin listener routes.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Router construction, HTTP client, and graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `toml` | TOML config file support _(enabled by default)_ |
//! | `yaml` | YAML config file support |
//! | `json` | JSON config file support |
//! | `file-backends` | All config file formats |

// Binary crate; public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod admin;
pub mod audit;
pub mod balancer;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod probe;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod upstream;
