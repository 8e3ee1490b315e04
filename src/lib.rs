//! gRPC health checking (`grpc.health.v1.Health`) with a coalescing watch
//! engine.
//!
//! - [`StatusRegistry`] holds service statuses and fans changes out to
//!   watchers, each served by its own [`WatchNotifier`].
//! - [`HealthService`] exposes a [`Checker`] (and optionally a [`Watcher`])
//!   over tonic.
//! - [`Client`] performs checks and consumes watch streams.

mod client;
mod config;
pub mod constants;
mod errors;
pub mod metrics;
mod network;
mod registry;
mod status;
mod watch;

pub use client::*;
pub use config::*;
pub use errors::*;
pub use network::*;
pub use registry::*;
pub use status::*;
pub use watch::*;

//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms10, ObjectivePercentile::P99);
