use std::sync::Arc;

use d_health::metrics;
use d_health::start_rpc_server;
use d_health::Error;
use d_health::HealthConfig;
use d_health::HealthService;
use d_health::Result;
use d_health::StatusRegistry;
use d_health::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = HealthConfig::new()?.validate()?;

    // Initializing Logs
    init_observability()?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let registry = StatusRegistry::from_config(&config);

    if config.monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(config.monitoring.prometheus_port, graceful_rx.clone()));
    }

    let service = HealthService::with_watcher(registry.clone()).response_buffer_size(config.watch.response_buffer_size);
    let server = tokio::spawn(start_rpc_server(service, config.server.clone(), graceful_rx));

    info!("Application started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(registry, graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    match server.await {
        Ok(Ok(())) => info!("Exiting program."),
        Ok(Err(e)) => {
            error!("health server stops: {:?}", e);
            return Err(e);
        }
        Err(e) => return Err(Error::Fatal(format!("health server task failed: {e}"))),
    }
    Ok(())
}

async fn graceful_shutdown(
    registry: Arc<StatusRegistry>,
    graceful_tx: watch::Sender<()>,
) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(SystemError::Io)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SystemError::Io)?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    // Open watch streams would hold the graceful shutdown open.
    registry.shutdown();

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        SystemError::SignalSendFailed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|e| Error::Fatal(format!("failed to initialize tracing: {e}")))
}
