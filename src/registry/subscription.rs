use std::sync::Arc;
use std::sync::Weak;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::StatusRegistry;
use crate::WatchNotifier;

/// Handle to one active watch.
///
/// Stopping (or dropping) the handle halts deliveries and removes the
/// subscriber from the registry. Both are idempotent and safe to race with
/// context cancellation. A watch rejected up front still delivers its
/// terminal error after the handle is gone.
#[derive(Debug)]
#[must_use = "dropping a Subscription stops the watch"]
pub struct Subscription {
    service: String,
    /// `None` for watches rejected up front, which never join the registry.
    subscriber_id: Option<u64>,
    notifier: Arc<WatchNotifier>,
    registry: Weak<StatusRegistry>,
    /// Cancelled once the subscriber has left the registry.
    finished: CancellationToken,
}

impl Subscription {
    pub(super) fn attached(
        notifier: Arc<WatchNotifier>,
        registry: Weak<StatusRegistry>,
        finished: CancellationToken,
    ) -> Self {
        Self {
            service: notifier.service().to_string(),
            subscriber_id: Some(notifier.subscriber_id()),
            notifier,
            registry,
            finished,
        }
    }

    pub(super) fn detached(notifier: Arc<WatchNotifier>) -> Self {
        let finished = CancellationToken::new();
        finished.cancel();
        Self {
            service: notifier.service().to_string(),
            subscriber_id: None,
            notifier,
            registry: Weak::new(),
            finished,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn subscriber_id(&self) -> Option<u64> {
        self.subscriber_id
    }

    /// True once the subscriber is no longer registered, whatever the cause.
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// Resolves when the subscriber leaves the registry.
    pub async fn finished(&self) {
        self.finished.cancelled().await
    }

    pub fn stop(&self) {
        let Some(id) = self.subscriber_id else {
            // Rejected watches never registered; their terminal error is already queued.
            return;
        };
        if self.notifier.stop() {
            debug!(service = %self.service, subscriber_id = id, "subscription stopped");
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_subscriber(&self.service, id);
        }
        self.finished.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}
