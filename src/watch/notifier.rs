use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::WatchSink;
use super::WatchUpdate;
use crate::metrics::WATCH_DELIVERIES;
use crate::HealthError;
use crate::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No delivery loop is running.
    Idle,
    /// A delivery loop owns the sink.
    Delivering,
    /// The terminal outcome has been handled; nothing is ever delivered again.
    Terminated,
}

#[derive(Debug)]
struct DeliveryState {
    latest: Status,
    /// Last status handed to the sink. `None` until the initial delivery.
    delivered: Option<Status>,
    error: Option<HealthError>,
    phase: Phase,
}

enum Step {
    Deliver(Status),
    Terminate(HealthError),
    Exit,
}

/// Per-subscription delivery engine.
///
/// `notify` only records the newest state and makes sure a single delivery
/// loop is running; it never waits on the sink. The loop always delivers the
/// most recent status, so a consumer that falls behind skips intermediate
/// values but always ends up observing the latest one. Errors are terminal:
/// at most one is delivered and it is always the last delivery.
pub struct WatchNotifier {
    service: String,
    subscriber_id: u64,
    state: Mutex<DeliveryState>,
    /// Set by `stop` or by the loop claiming the terminal delivery.
    stopped: AtomicBool,
    sink: Arc<dyn WatchSink>,
    runtime: Handle,
}

impl std::fmt::Debug for WatchNotifier {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchNotifier")
            .field("service", &self.service)
            .field("subscriber_id", &self.subscriber_id)
            .field("state", &*self.state.lock())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl WatchNotifier {
    /// Creates an idle notifier whose first delivery will be `initial`.
    ///
    /// Nothing is sent until [`start`](Self::start) or the first `notify`.
    pub(crate) fn new(
        service: &str,
        subscriber_id: u64,
        initial: Status,
        sink: Arc<dyn WatchSink>,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            service: service.to_string(),
            subscriber_id,
            state: Mutex::new(DeliveryState {
                latest: initial,
                delivered: None,
                error: None,
                phase: Phase::Idle,
            }),
            stopped: AtomicBool::new(false),
            sink,
            runtime,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn subscriber_id(&self) -> u64 {
        self.subscriber_id
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Kicks off the initial delivery.
    pub(crate) fn start(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.phase == Phase::Idle && !self.is_stopped() {
            self.schedule(&mut state);
        }
    }

    /// Records an update and wakes the delivery loop.
    ///
    /// Returns `false` when the update was discarded: the notifier is stopped
    /// or terminated, an error is already pending, or the status equals the
    /// latest recorded one.
    pub(crate) fn notify(
        self: &Arc<Self>,
        update: WatchUpdate,
    ) -> bool {
        let mut state = self.state.lock();
        if state.phase == Phase::Terminated || state.error.is_some() || self.is_stopped() {
            trace!(service = %self.service, subscriber_id = self.subscriber_id, "update discarded after termination");
            return false;
        }

        match update {
            Ok(status) => {
                if status == state.latest {
                    return false;
                }
                state.latest = status;
            }
            Err(err) => {
                state.error = Some(err);
            }
        }

        if state.phase == Phase::Idle {
            self.schedule(&mut state);
        }
        true
    }

    /// Prevents any further delivery. Returns `true` on the first call.
    pub(crate) fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    fn schedule(
        self: &Arc<Self>,
        state: &mut DeliveryState,
    ) {
        state.phase = Phase::Delivering;
        self.runtime.spawn(self.clone().run());
    }

    async fn run(self: Arc<Self>) {
        loop {
            let step = {
                let mut state = self.state.lock();
                if let Some(err) = state.error.take() {
                    state.phase = Phase::Terminated;
                    Step::Terminate(err)
                } else if self.is_stopped() {
                    state.phase = Phase::Terminated;
                    Step::Exit
                } else if state.delivered == Some(state.latest) {
                    state.phase = Phase::Idle;
                    Step::Exit
                } else {
                    state.delivered = Some(state.latest);
                    Step::Deliver(state.latest)
                }
            };

            match step {
                Step::Deliver(status) => {
                    debug!(service = %self.service, subscriber_id = self.subscriber_id, %status, "delivering status");
                    self.sink.deliver(Ok(status)).await;
                    WATCH_DELIVERIES.with_label_values(&["status"]).inc();
                }
                Step::Terminate(err) => {
                    // Whoever flips `stopped` first owns the outcome; a
                    // concurrent stop() suppresses the error.
                    if self
                        .stopped
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        warn!(service = %self.service, subscriber_id = self.subscriber_id, error = %err, "watch terminated");
                        self.sink.deliver(Err(err)).await;
                        WATCH_DELIVERIES.with_label_values(&["terminal"]).inc();
                    }
                    return;
                }
                Step::Exit => return,
            }
        }
    }
}
