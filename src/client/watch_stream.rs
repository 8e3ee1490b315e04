use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::Stream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic_health::pb::HealthCheckResponse;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::HealthError;
use crate::Status;
use crate::WatchContext;

/// Lifecycle of a client-side watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Forwarding statuses from the server.
    Open,
    /// The watch has ended and its outcome is final, but a forwarded status
    /// is still waiting in the feed.
    Draining,
    /// The watch has ended and the feed is exhausted or dropped.
    Closed,
}

#[derive(Debug)]
struct ConsumerShared {
    service: String,
    stopped: AtomicBool,
    /// Child of the caller's context; `stop` cancels only this one.
    cancel: CancellationToken,
    /// Cancelled once the worker has exited.
    done: CancellationToken,
    outcome: Mutex<Option<HealthError>>,
    state: Mutex<ConsumerState>,
}

impl ConsumerShared {
    /// Cancellation the caller asked for through `stop` is not an error.
    fn classify(
        &self,
        err: HealthError,
    ) -> Option<HealthError> {
        if self.stopped.load(Ordering::Acquire) && matches!(err, HealthError::Cancelled) {
            None
        } else {
            Some(err)
        }
    }

    /// The consumer has seen everything the worker forwarded.
    fn mark_drained(&self) {
        let mut state = self.state.lock();
        if *state == ConsumerState::Draining {
            *state = ConsumerState::Closed;
        }
    }
}

/// Client side of a `Watch` call.
///
/// Statuses arrive on a single-slot feed; the worker reading the server
/// stream blocks while the slot is full. The feed closes when the watch ends
/// for any reason, after which [`stop`](Self::stop) reports the outcome.
#[derive(Debug)]
pub struct HealthWatch {
    feed: StatusFeed,
    stopper: WatchStopper,
}

impl HealthWatch {
    /// Spawns the worker draining `stream` until `ctx` ends, the stream ends,
    /// or the watch is stopped.
    pub fn spawn<S>(
        service: &str,
        stream: S,
        ctx: WatchContext,
    ) -> Self
    where
        S: Stream<Item = std::result::Result<HealthCheckResponse, tonic::Status>> + Send + Unpin + 'static,
    {
        let ctx = ctx.child();
        let (tx, feed) = mpsc::channel(1);
        let shared = Arc::new(ConsumerShared {
            service: service.to_string(),
            stopped: AtomicBool::new(false),
            cancel: ctx.cancel_token().clone(),
            done: CancellationToken::new(),
            outcome: Mutex::new(None),
            state: Mutex::new(ConsumerState::Open),
        });

        tokio::spawn(consume(stream, tx, ctx, shared.clone()));

        Self {
            feed: StatusFeed {
                rx: feed,
                shared: shared.clone(),
            },
            stopper: WatchStopper { shared },
        }
    }

    /// Next status, or `None` once the watch has ended.
    pub async fn recv(&mut self) -> Option<Status> {
        self.feed.recv().await
    }

    pub fn service(&self) -> &str {
        &self.stopper.shared.service
    }

    pub fn state(&self) -> ConsumerState {
        self.stopper.state()
    }

    /// A handle that can stop the watch from elsewhere.
    pub fn stopper(&self) -> WatchStopper {
        self.stopper.clone()
    }

    /// Ends the watch and returns its terminal error, if any.
    pub async fn stop(&self) -> std::result::Result<(), HealthError> {
        self.stopper.stop().await
    }

    pub fn into_parts(self) -> (StatusFeed, WatchStopper) {
        (self.feed, self.stopper)
    }
}

/// Receiving half of a [`HealthWatch`].
#[derive(Debug)]
pub struct StatusFeed {
    rx: mpsc::Receiver<Status>,
    shared: Arc<ConsumerShared>,
}

impl StatusFeed {
    /// Next status, or `None` once the watch has ended and the feed is empty.
    pub async fn recv(&mut self) -> Option<Status> {
        let next = self.rx.recv().await;
        if next.is_none() {
            self.shared.mark_drained();
        }
        next
    }
}

impl Drop for StatusFeed {
    fn drop(&mut self) {
        self.rx.close();
        self.shared.mark_drained();
    }
}

/// Stops a [`HealthWatch`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct WatchStopper {
    shared: Arc<ConsumerShared>,
}

impl WatchStopper {
    /// Cancels the watch and waits for the worker to exit.
    ///
    /// Idempotent: every call returns the same outcome. Cancellation caused
    /// by this call is not reported; a server error, a deadline or a
    /// cancellation of the caller's own context is.
    pub async fn stop(&self) -> std::result::Result<(), HealthError> {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.cancel.cancel();
        self.shared.done.cancelled().await;
        match self.shared.outcome.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.shared.state.lock()
    }
}

async fn consume<S>(
    mut stream: S,
    tx: mpsc::Sender<Status>,
    ctx: WatchContext,
    shared: Arc<ConsumerShared>,
) where
    S: Stream<Item = std::result::Result<HealthCheckResponse, tonic::Status>> + Send + Unpin + 'static,
{
    let outcome = loop {
        let message = tokio::select! {
            cause = ctx.done() => break shared.classify(cause),
            _ = tx.closed() => {
                trace!(service = %shared.service, "status feed dropped");
                break None;
            }
            message = stream.next() => message,
        };

        match message {
            Some(Ok(response)) => {
                let status = Status::from_wire(response.status);
                debug!(service = %shared.service, %status, "received status");
                tokio::select! {
                    sent = tx.send(status) => {
                        if sent.is_err() {
                            break None;
                        }
                    }
                    cause = ctx.done() => break shared.classify(cause),
                }
            }
            Some(Err(status)) => break shared.classify(HealthError::from(status)),
            None => break None,
        }
    };

    // Dropping the stream resets the call and frees the server's subscriber.
    drop(stream);

    if let Some(err) = &outcome {
        warn!(service = %shared.service, error = %err, "watch ended");
    }
    *shared.outcome.lock() = outcome;
    {
        let mut state = shared.state.lock();
        let buffered = !tx.is_closed() && tx.capacity() == 0;
        *state = if buffered {
            ConsumerState::Draining
        } else {
            ConsumerState::Closed
        };
    }
    drop(tx);
    shared.done.cancel();
}
