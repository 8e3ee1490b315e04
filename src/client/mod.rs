//! Client for the `grpc.health.v1.Health` service.
//!
//! - [`Client`] - unary checks and streaming watches
//! - [`ClientBuilder`] - configurable client construction
//! - [`HealthWatch`] - the consumer side of a watch stream
//!
//! # Basic Usage
//! ```no_run
//! use d_health::{Client, WatchContext};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = Client::builder("127.0.0.1:50051")
//!         .request_timeout(Duration::from_secs(1))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let status = client.check("").await.unwrap();
//!     println!("process is {status}");
//!
//!     let mut watch = client.watch("db", WatchContext::default()).await.unwrap();
//!     while let Some(status) = watch.recv().await {
//!         println!("db is {status}");
//!     }
//!     watch.stop().await.unwrap();
//! }
//! ```

mod builder;
mod config;
mod watch_stream;

pub use builder::*;
pub use config::*;
pub use watch_stream::*;


use tokio::time::timeout;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tracing::debug;

use crate::HealthError;
use crate::Status;
use crate::WatchContext;

/// Health checking client over one channel.
///
/// Cloning is cheap and clones share the channel.
#[derive(Clone, Debug)]
pub struct Client {
    inner: HealthClient<Channel>,
    config: ClientConfig,
}

impl Client {
    /// Create a configured client builder
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    pub fn new(
        channel: Channel,
        config: ClientConfig,
    ) -> Self {
        let mut inner = HealthClient::new(channel);
        if config.enable_compression {
            inner = inner
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }
        Self { inner, config }
    }

    /// Status of `service`; the empty name checks the process.
    pub async fn check(
        &self,
        service: &str,
    ) -> std::result::Result<Status, HealthError> {
        let mut client = self.inner.clone();
        let request = HealthCheckRequest {
            service: service.to_string(),
        };
        match timeout(self.config.request_timeout, client.check(request)).await {
            Ok(Ok(response)) => Ok(Status::from_wire(response.into_inner().status)),
            Ok(Err(status)) => Err(status.into()),
            Err(_) => {
                debug!(service, timeout = ?self.config.request_timeout, "check timed out");
                Err(HealthError::DeadlineExceeded)
            }
        }
    }

    /// Opens a watch on `service` that lives until `ctx` ends or the returned
    /// handle is stopped.
    ///
    /// Fails only when the call itself cannot be started; errors sent by the
    /// server after that, including `NotFound`, are reported by
    /// [`HealthWatch::stop`].
    pub async fn watch(
        &self,
        service: &str,
        ctx: WatchContext,
    ) -> std::result::Result<HealthWatch, HealthError> {
        let mut client = self.inner.clone();
        let request = HealthCheckRequest {
            service: service.to_string(),
        };
        let response = tokio::select! {
            cause = ctx.done() => return Err(cause),
            response = client.watch(request) => response?,
        };
        Ok(HealthWatch::spawn(service, response.into_inner(), ctx))
    }
}
