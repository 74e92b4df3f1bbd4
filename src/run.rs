//! Server startup and graceful shutdown.

use std::future::IntoFuture as _;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::process;
use std::time::Duration;

use eyre::WrapErr as _;
use tokio::{net, signal, time};
use tracing::{error, info};

use crate::app::{runtime, state};
use crate::{config, http};

/// Hard bound on orderly teardown; overrunning it forces process exit.
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates a future that resolves when a shutdown signal is received.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to create SIGTERM signal handler");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        drop(signal::ctrl_c().await);
    }
}

/// Loads the config and runs the relay until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the listener
/// cannot bind.
pub async fn start(
    config_path: &Path,
    port_override: Option<u16>,
    bind_override: Option<&str>,
) -> eyre::Result<()> {
    let config = config::load(config_path).await?;

    // Apply optional overrides from CLI/tests
    let listen_port = port_override.unwrap_or(config.server.port);
    let bind_str = bind_override.map_or_else(|| config.server.bind.clone(), ToString::to_string);
    let listen_ip: IpAddr = bind_str
        .parse()
        .wrap_err(format!("Invalid bind address: {bind_str}"))?;

    let (app_state, liveness_tx) = state::initialize_state(config);
    let tasks = runtime::start_background_tasks(&app_state, liveness_tx);

    let app = http::create_app(app_state.clone());
    let addr = SocketAddr::from((listen_ip, listen_port));
    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err(format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    let server = axum::serve(listener, app).into_future();
    tokio::select! {
        res = server => res?,
        () = shutdown_signal() => {
            info!("Received shutdown, shutting down");
        }
    }

    // Timers first, then the upstream session; the listener is already gone
    // with the dropped server future.
    let teardown = async {
        for task in &tasks {
            task.abort();
        }
        app_state.upstream.disconnect().await;
    };
    if time::timeout(SHUTDOWN_TIMEOUT, teardown).await.is_err() {
        error!("Shutdown stalled beyond {:?}, forcing exit", SHUTDOWN_TIMEOUT);
        process::exit(1);
    }
    info!("Shutdown complete");

    Ok(())
}
