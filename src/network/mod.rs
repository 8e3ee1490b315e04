//! Network surface of the health service.
pub mod grpc;

pub use grpc::*;
