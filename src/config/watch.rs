use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Limits applied to watch subscriptions.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Capacity of the per-stream gRPC response channel
    #[serde(default = "default_response_buffer_size")]
    pub response_buffer_size: usize,

    /// Max concurrent watchers of one service name, 0 for unlimited
    #[serde(default = "default_max_subscribers_per_service")]
    pub max_subscribers_per_service: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            response_buffer_size: default_response_buffer_size(),
            max_subscribers_per_service: default_max_subscribers_per_service(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.response_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "response_buffer_size must be > 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_response_buffer_size() -> usize {
    4
}
fn default_max_subscribers_per_service() -> usize {
    0
}
