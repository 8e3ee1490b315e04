//! gRPC surface of the health service.
//!
//! Exposes `grpc.health.v1.Health` over tonic, wired to a [`Checker`] and,
//! when the checker can stream changes, a [`Watcher`](crate::Watcher).

mod health_service;
pub use health_service::*;

#[cfg(test)]
mod health_service_test;

//-------------------------------------------------------------------------------
// Start RPC Server
use futures::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic_health::pb::health_server::HealthServer;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::constants::HEALTH_SERVICE_NAME;
use crate::Checker;
use crate::Result;
use crate::ServerConfig;
use crate::SystemError;

/// Binds `config.listen_address` and serves health checks until the
/// shutdown signal fires.
pub async fn start_rpc_server<C: Checker>(
    service: HealthService<C>,
    config: ServerConfig,
    shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let listen_address = config.socket_addr()?;
    let listener = TcpListener::bind(listen_address).await.map_err(|e| {
        error!("failed to bind health server on {}: {:?}", listen_address, e);
        SystemError::Io(e)
    })?;
    serve_with_listener(service, config, listener, shutdown_signal).await
}

/// Serves health checks on an already bound listener.
///
/// Outstanding watch streams hold graceful shutdown open; terminate them
/// first, e.g. with [`StatusRegistry::shutdown`](crate::StatusRegistry::shutdown).
pub async fn serve_with_listener<C: Checker>(
    service: HealthService<C>,
    config: ServerConfig,
    listener: TcpListener,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let local_addr = listener.local_addr().map_err(SystemError::Io)?;

    let mut server_builder = tonic::transport::Server::builder()
        .concurrency_limit_per_connection(config.concurrency_limit_per_connection)
        .tcp_keepalive(Some(config.tcp_keepalive()))
        .http2_keepalive_interval(Some(config.http2_keep_alive_interval()))
        .http2_keepalive_timeout(Some(config.http2_keep_alive_timeout()))
        .tcp_nodelay(config.tcp_nodelay);

    let mut health_server = HealthServer::new(service);
    if config.enable_compression {
        health_server = health_server
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip);
    }

    info!("{} listening on {}", HEALTH_SERVICE_NAME, local_addr);
    if let Err(e) = server_builder
        .add_service(health_server)
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            shutdown_signal.changed().map(|_s| {
                warn!("Stopping health server. {}", local_addr);
            }),
        )
        .await
    {
        error!("error to start health rpc server :{:?}.", e);
        return Err(SystemError::ServerUnavailable.into());
    }
    debug!("health rpc service finished!");
    Ok(())
}
