//! `portico run`: start the gateway.
//!
//! Loads the config file, applies CLI overrides, builds the [`Gateway`]
//! and serves the proxy and admin listeners until Ctrl+C / SIGTERM. On
//! shutdown both listeners drain, probes stop, and queued audit entries
//! are flushed (bounded by `--drain-secs`).

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::cli::RunArgs;
use crate::config;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::logging;
use crate::server;

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let (mut config, version) = config::load_file(&args.config).await?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(admin_port) = args.admin_port {
        config.server.admin_port = admin_port;
    }

    let proxy_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let admin_addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.admin_port).parse()?;

    tracing::info!(
        path = %args.config.display(),
        version = %version.short(),
        services = config.services.len(),
        upstreams = config.total_upstreams(),
        "config loaded"
    );

    let gateway = Arc::new(
        Gateway::new(config)?.with_source(args.config.display().to_string(), version),
    );

    let proxy_listener = tokio::net::TcpListener::bind(proxy_addr).await?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;

    tracing::info!(
        proxy = %proxy_addr,
        admin = %admin_addr,
        services = gateway.services().len(),
        audit = gateway.audit().is_enabled(),
        "portico started"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let proxy = axum::serve(
        proxy_listener,
        server::build_router(Arc::clone(&gateway))
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
    .into_future();

    let admin = axum::serve(
        admin_listener,
        server::build_admin_router(Arc::clone(&gateway)),
    )
    .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
    .into_future();

    let signal = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    let (proxy_result, admin_result, ()) = tokio::join!(proxy, admin, signal);
    proxy_result?;
    admin_result?;

    let drain = Duration::from_secs(args.drain_secs);
    if tokio::time::timeout(drain, gateway.shutdown()).await.is_err() {
        tracing::warn!(
            drain_secs = args.drain_secs,
            "audit flush timed out, pending entries lost"
        );
    }

    tracing::info!("portico stopped");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
