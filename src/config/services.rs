use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::Status;

/// Statuses registered before the server starts accepting requests.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServicesConfig {
    /// Status of the whole process, reported under the empty service name
    #[serde(default = "default_process_status")]
    pub process_status: Status,

    /// Service names registered as serving at startup
    #[serde(default)]
    pub initial_services: Vec<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            process_status: default_process_status(),
            initial_services: Vec::new(),
        }
    }
}

impl ServicesConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_services.iter().any(|name| name.is_empty()) {
            return Err(Error::Config(ConfigError::Message(
                "initial_services cannot contain the empty name, use process_status instead".into(),
            )));
        }
        Ok(())
    }
}

fn default_process_status() -> Status {
    Status::Serving
}
