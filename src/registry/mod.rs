//! Service status registry and watch subscription management.
//!
//! [`StatusRegistry`] is the authoritative map of service name to status and
//! owns the subscriber sets fed by [`set_status`](StatusRegistry::set_status).
//! [`StaticChecker`] answers checks from a fixed list and cannot be watched.

mod static_checker;
mod status_registry;
mod subscription;

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
pub use static_checker::*;
pub use status_registry::*;
pub use subscription::*;
use tonic::async_trait;

use crate::HealthError;
use crate::Status;
use crate::WatchContext;
use crate::WatchSink;


/// Answers point-in-time health checks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Checker: Send + Sync + 'static {
    /// Status of `service`; the empty name is the process as a whole.
    async fn check(
        &self,
        service: &str,
    ) -> std::result::Result<Status, HealthError>;
}

/// A checker that can also stream status changes.
pub trait Watcher: Checker {
    /// Subscribes `sink` to `service` until `ctx` ends or the returned handle
    /// is stopped.
    ///
    /// Never fails synchronously: every failure, including an unknown
    /// service, arrives as the single terminal delivery on `sink`.
    fn watch(
        &self,
        service: &str,
        ctx: WatchContext,
        sink: Arc<dyn WatchSink>,
    ) -> Subscription;
}
