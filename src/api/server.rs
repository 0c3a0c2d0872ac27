use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;

use crate::application::UpgradeService;
use crate::config::ServerSettings;
use crate::runtime::Runtime;

use super::router;

/// Serve the API until SIGINT or SIGTERM.
pub async fn serve<R: Runtime + 'static>(
    service: Arc<UpgradeService<R>>,
    runtime: &R,
    settings: &ServerSettings,
) -> Result<()> {
    let bind = if settings.bind.trim().is_empty() {
        "0.0.0.0"
    } else {
        settings.bind.trim()
    };
    let addr = format!("{}:{}", bind, settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local_addr = listener.local_addr()?;

    info!("Starting API service on {}", reachable_url(runtime, local_addr));

    let app = router(service, &settings.allowed_origins);
    serve_with_shutdown(listener, app, shutdown_signal()).await
}

/// Serve `app` on `listener` until `shutdown` completes.
pub async fn serve_with_shutdown<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API service failed")?;

    info!("API service stopped");
    Ok(())
}

/// URL an operator can use to reach the service. An unspecified bind
/// address is replaced by the machine's outbound IP.
fn reachable_url<R: Runtime>(runtime: &R, local_addr: SocketAddr) -> String {
    let host = if local_addr.ip().is_unspecified() {
        match runtime.outbound_ip() {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Could not determine outbound IP: {}", e);
                local_addr.ip()
            }
        }
    } else {
        local_addr.ip()
    };

    match host {
        IpAddr::V4(ip) => format!("http://{}:{}", ip, local_addr.port()),
        IpAddr::V6(ip) => format!("http://[{}]:{}", ip, local_addr.port()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
