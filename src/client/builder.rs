use std::time::Duration;

use tonic::transport::Endpoint;
use tracing::error;

use super::Client;
use super::ClientConfig;
use crate::NetworkError;
use crate::Result;

pub struct ClientBuilder {
    config: ClientConfig,
    endpoint: String,
}

impl ClientBuilder {
    /// Create a new builder with default config for `endpoint`
    ///
    /// A bare `host:port` is treated as `http://host:port`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::default(),
            endpoint: endpoint.into(),
        }
    }

    /// Set connection timeout (default: 1s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set request timeout (default: 3s)
    pub fn request_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Enable/disable compression (default: disabled)
    pub fn enable_compression(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.enable_compression = enable;
        self
    }

    /// Completely replaces the default configuration, discarding anything set
    /// through the individual methods.
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Connects to the endpoint with the current configuration
    pub async fn build(self) -> Result<Client> {
        let endpoint = self.endpoint()?;
        let channel = endpoint.connect().await.map_err(|e| {
            error!("failed to connect to health server {}: {:?}", self.endpoint, e);
            NetworkError::TonicError(Box::new(e))
        })?;
        Ok(Client::new(channel, self.config))
    }

    /// Builds a client whose channel connects on first use
    pub fn build_lazy(self) -> Result<Client> {
        let channel = self.endpoint()?.connect_lazy();
        Ok(Client::new(channel, self.config))
    }

    fn endpoint(&self) -> Result<Endpoint> {
        let address = address_str(&self.endpoint);
        let endpoint = Endpoint::from_shared(address)
            .map_err(|_| NetworkError::InvalidURI(self.endpoint.clone()))?
            .connect_timeout(self.config.connect_timeout)
            .tcp_keepalive(Some(self.config.tcp_keepalive))
            .http2_keep_alive_interval(self.config.http2_keepalive_interval)
            .keep_alive_timeout(self.config.http2_keepalive_timeout)
            .keep_alive_while_idle(true);
        Ok(endpoint)
    }
}

fn address_str(addr: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
