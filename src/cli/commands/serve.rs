use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use crate::api;
use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_serve(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %config.server.env,
        "Greenlight starting"
    );

    let grace = config.server.shutdown_grace();
    let port = config.server.port;

    let shared = Arc::new(SharedState::new(config).await?);
    let sweeper = shared
        .rate_limiter
        .is_enabled()
        .then(|| shared.rate_limiter.spawn_sweeper());

    let app = api::router(api::create_app_state(shared.clone(), prometheus_handle));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Web server listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    info!(pending = shared.background.len(), "Completing background tasks");
    if !shared.background.drain(grace).await {
        error!("Background tasks were aborted at shutdown");
    }

    served.context("Web server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Error listening for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Error installing SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!(signal = "SIGINT", "Shutdown signal received"),
        () = terminate => info!(signal = "SIGTERM", "Shutdown signal received"),
    }
}
