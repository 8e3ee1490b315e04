/// Service name that stands for the process as a whole.
pub const PROCESS_SERVICE: &str = "";

/// Fully-qualified name of the health checking gRPC service.
pub const HEALTH_SERVICE_NAME: &str = "grpc.health.v1.Health";
