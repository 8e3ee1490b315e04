//! Health Service Error Hierarchy
//!
//! Defines the error types of the health checking server and client,
//! split between protocol-level outcomes (what a caller of `Check` or
//! `Watch` observes) and infrastructure failures (config, transport, I/O).

use config::ConfigError;
use tonic::Code;
use tonic::Status;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (server bootstrap, signals, I/O)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Health protocol outcomes (unknown service, cancelled watch, ...)
    #[error(transparent)]
    Health(#[from] HealthError),

    /// Client connection failures
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Outcome of a health check or watch that is not a status.
///
/// This is the error taxonomy shared by the registry, the notifier and the
/// client. It is `Clone` because a watch stores its terminal error and hands
/// it out on every `stop()` call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HealthError {
    /// Non-empty service name that was never registered
    #[error("unknown service {service}")]
    NotFound { service: String },

    /// The checker behind the endpoint does not support watching
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// The watch context was cancelled
    #[error("watch cancelled")]
    Cancelled,

    /// The watch context deadline passed
    #[error("watch deadline exceeded")]
    DeadlineExceeded,

    /// The registry refuses new or existing subscriptions
    #[error("health service unavailable: {0}")]
    Unavailable(String),

    /// Any other status code sent by the remote peer
    #[error("rpc failed: {0}")]
    Rpc(Status),
}

impl HealthError {
    pub fn not_found(service: impl Into<String>) -> Self {
        HealthError::NotFound {
            service: service.into(),
        }
    }
}

impl From<HealthError> for Status {
    fn from(err: HealthError) -> Self {
        match err {
            HealthError::NotFound { service } => Status::not_found(format!("unknown service {service}")),
            HealthError::Unimplemented(msg) => Status::unimplemented(msg),
            HealthError::Cancelled => Status::cancelled("watch cancelled"),
            HealthError::DeadlineExceeded => Status::deadline_exceeded("watch deadline exceeded"),
            HealthError::Unavailable(msg) => Status::unavailable(msg),
            HealthError::Rpc(status) => status,
        }
    }
}

impl From<Status> for HealthError {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::NotFound => HealthError::NotFound {
                service: status.message().trim_start_matches("unknown service ").to_string(),
            },
            Code::Unimplemented => HealthError::Unimplemented(status.message().to_string()),
            Code::Cancelled => HealthError::Cancelled,
            Code::DeadlineExceeded => HealthError::DeadlineExceeded,
            Code::Unavailable => HealthError::Unavailable(status.message().to_string()),
            _ => HealthError::Rpc(status),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// gRPC server failed to bind or terminated abnormally
    #[error("RPC server unavailable")]
    ServerUnavailable,

    /// Metrics or RPC listener could not be opened
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    SignalSendFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Malformed endpoint addresses
    #[error("Invalid URI format: {0}")]
    InvalidURI(String),

    /// Channel could not be established (refused, unreachable, connect timeout)
    #[error(transparent)]
    TonicError(#[from] Box<tonic::transport::Error>),
}
