use tokio::sync::mpsc;
use tonic::async_trait;
use tracing::trace;

use super::WatchUpdate;

/// Receives the deliveries of one subscription.
///
/// A notifier awaits `deliver` before looking at newer state, so a slow sink
/// is what makes updates coalesce. Implementations must not fail; a consumer
/// that went away should simply drop the update.
#[async_trait]
pub trait WatchSink: Send + Sync + 'static {
    async fn deliver(
        &self,
        update: WatchUpdate,
    );
}

#[async_trait]
impl WatchSink for mpsc::Sender<WatchUpdate> {
    async fn deliver(
        &self,
        update: WatchUpdate,
    ) {
        if self.send(update).await.is_err() {
            trace!("watch receiver dropped, update discarded");
        }
    }
}
