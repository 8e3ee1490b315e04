//! Serving status of a service, as carried on the `grpc.health.v1` wire.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use tonic_health::pb::health_check_response::ServingStatus;

/// Health of a service or of the whole process.
///
/// The discriminants are the wire values of `HealthCheckResponse.status` and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Status {
    /// The health state is indeterminate.
    #[default]
    Unknown = 0,

    /// The service is ready to accept requests.
    Serving = 1,

    /// The process is healthy but the service is not accepting requests, for
    /// example because its primary database is unreachable.
    NotServing = 2,
}

impl Status {
    /// Decodes a wire value.
    ///
    /// Values outside the three known states, including the reserved
    /// `SERVICE_UNKNOWN` (3), decode as `Unknown`.
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => Status::Serving,
            2 => Status::NotServing,
            _ => Status::Unknown,
        }
    }

    pub fn as_wire(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Serving => "serving",
            Status::NotServing => "not_serving",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Status> for ServingStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Unknown => ServingStatus::Unknown,
            Status::Serving => ServingStatus::Serving,
            Status::NotServing => ServingStatus::NotServing,
        }
    }
}

impl From<ServingStatus> for Status {
    fn from(status: ServingStatus) -> Self {
        match status {
            ServingStatus::Serving => Status::Serving,
            ServingStatus::NotServing => Status::NotServing,
            ServingStatus::Unknown | ServingStatus::ServiceUnknown => Status::Unknown,
        }
    }
}
