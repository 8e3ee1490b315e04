use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Checker;
use super::Subscription;
use super::Watcher;
use crate::constants::PROCESS_SERVICE;
use crate::metrics::HEALTH_STATUS_UPDATES;
use crate::metrics::WATCH_SUBSCRIBERS;
use crate::HealthConfig;
use crate::HealthError;
use crate::Status;
use crate::WatchConfig;
use crate::WatchContext;
use crate::WatchNotifier;
use crate::WatchSink;

struct Subscriber {
    notifier: Arc<WatchNotifier>,
    /// Shared with the `Subscription` handle and the context task.
    finished: CancellationToken,
}

#[derive(Default)]
struct RegistryState {
    statuses: HashMap<String, Status>,
    subscribers: HashMap<String, HashMap<u64, Subscriber>>,
    shut_down: bool,
}

/// Authoritative service status map with live watch fan-out.
///
/// Status writes and subscriber registration happen under one write lock, so
/// a watcher either sees a status as its initial value or is notified of it,
/// never neither. Fan-out never waits on a consumer: each notifier only
/// records the update and wakes its own delivery loop.
pub struct StatusRegistry {
    state: RwLock<RegistryState>,
    next_subscriber_id: AtomicU64,
    max_subscribers_per_service: usize,
    me: Weak<StatusRegistry>,
}

impl std::fmt::Debug for StatusRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("StatusRegistry")
            .field("statuses", &state.statuses)
            .field("watched_services", &state.subscribers.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

impl StatusRegistry {
    pub fn new() -> Arc<Self> {
        Self::with_config(&WatchConfig::default())
    }

    pub fn with_config(config: &WatchConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            state: RwLock::new(RegistryState::default()),
            next_subscriber_id: AtomicU64::new(1),
            max_subscribers_per_service: config.max_subscribers_per_service,
            me: me.clone(),
        })
    }

    /// Builds a registry seeded with the process status and the initial
    /// services of `config`.
    pub fn from_config(config: &HealthConfig) -> Arc<Self> {
        let registry = Self::with_config(&config.watch);
        registry.set_status(PROCESS_SERVICE, config.services.process_status);
        for service in &config.services.initial_services {
            registry.set_serving(service);
        }
        registry
    }

    /// Records `status` for `service` and notifies its watchers.
    ///
    /// Unknown names are registered on first use. Setting the current value
    /// again is harmless: watchers never see a status twice in a row.
    pub fn set_status(
        &self,
        service: &str,
        status: Status,
    ) {
        let mut state = self.state.write();
        let previous = state.statuses.insert(service.to_string(), status);
        if previous != Some(status) {
            info!(service, %status, previous = ?previous, "service status changed");
            HEALTH_STATUS_UPDATES.with_label_values(&[service]).inc();
        }

        if let Some(subscribers) = state.subscribers.get(service) {
            for subscriber in subscribers.values() {
                subscriber.notifier.notify(Ok(status));
            }
        }
    }

    pub fn set_serving(
        &self,
        service: &str,
    ) {
        self.set_status(service, Status::Serving);
    }

    pub fn set_not_serving(
        &self,
        service: &str,
    ) {
        self.set_status(service, Status::NotServing);
    }

    /// Current status of `service`.
    ///
    /// The process name reports `Serving` until set otherwise; any other
    /// unregistered name is `NotFound`.
    pub fn status(
        &self,
        service: &str,
    ) -> std::result::Result<Status, HealthError> {
        let state = self.state.read();
        Self::lookup(&state, service)
    }

    /// Snapshot of every registered service, sorted by name.
    pub fn services(&self) -> Vec<(String, Status)> {
        let state = self.state.read();
        let mut services: Vec<_> = state.statuses.iter().map(|(name, status)| (name.clone(), *status)).collect();
        services.sort_by(|a, b| a.0.cmp(&b.0));
        services
    }

    pub fn subscriber_count(
        &self,
        service: &str,
    ) -> usize {
        self.state.read().subscribers.get(service).map_or(0, HashMap::len)
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.read().shut_down
    }

    /// Ends every live watch with `Unavailable` and refuses new ones.
    ///
    /// Statuses stay readable through [`status`](Self::status).
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        if state.shut_down {
            return;
        }
        state.shut_down = true;

        let drained = std::mem::take(&mut state.subscribers);
        let mut terminated = 0usize;
        for (service, subscribers) in drained {
            for (_, subscriber) in subscribers {
                subscriber
                    .notifier
                    .notify(Err(HealthError::Unavailable("health service is shutting down".into())));
                subscriber.finished.cancel();
                WATCH_SUBSCRIBERS.with_label_values(&[service.as_str()]).dec();
                terminated += 1;
            }
        }
        info!(terminated, "status registry shut down");
    }

    /// Removes one subscriber. Returns `false` if it was already gone.
    pub(crate) fn remove_subscriber(
        &self,
        service: &str,
        subscriber_id: u64,
    ) -> bool {
        let mut state = self.state.write();
        let Some(subscribers) = state.subscribers.get_mut(service) else {
            return false;
        };
        let removed = subscribers.remove(&subscriber_id);
        if subscribers.is_empty() {
            state.subscribers.remove(service);
        }
        drop(state);

        match removed {
            Some(subscriber) => {
                subscriber.finished.cancel();
                WATCH_SUBSCRIBERS.with_label_values(&[service]).dec();
                info!(service, subscriber_id, "watch subscriber removed");
                true
            }
            None => false,
        }
    }

    fn lookup(
        state: &RegistryState,
        service: &str,
    ) -> std::result::Result<Status, HealthError> {
        match state.statuses.get(service) {
            Some(status) => Ok(*status),
            None if service == PROCESS_SERVICE => Ok(Status::Serving),
            None => Err(HealthError::not_found(service)),
        }
    }

    fn reject(
        service: &str,
        err: HealthError,
        sink: Arc<dyn WatchSink>,
        runtime: Handle,
    ) -> Subscription {
        debug!(service, error = %err, "watch rejected");
        let notifier = WatchNotifier::new(service, 0, Status::Unknown, sink, runtime);
        notifier.notify(Err(err));
        Subscription::detached(notifier)
    }

    /// Ends the subscription when its context does, unless it finished first.
    fn spawn_context_guard(
        &self,
        runtime: &Handle,
        notifier: Arc<WatchNotifier>,
        ctx: WatchContext,
        finished: CancellationToken,
    ) {
        let registry = self.me.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = finished.cancelled() => {}
                cause = ctx.done() => {
                    notifier.notify(Err(cause));
                    if let Some(registry) = registry.upgrade() {
                        registry.remove_subscriber(notifier.service(), notifier.subscriber_id());
                    }
                    finished.cancel();
                }
            }
        });
    }
}

#[async_trait]
impl Checker for StatusRegistry {
    async fn check(
        &self,
        service: &str,
    ) -> std::result::Result<Status, HealthError> {
        self.status(service)
    }
}

impl Watcher for StatusRegistry {
    /// # Panics
    /// Must be called from within a tokio runtime.
    fn watch(
        &self,
        service: &str,
        ctx: WatchContext,
        sink: Arc<dyn WatchSink>,
    ) -> Subscription {
        let runtime = Handle::current();

        if let Some(cause) = ctx.err() {
            return Self::reject(service, cause, sink, runtime);
        }

        let mut state = self.state.write();
        if state.shut_down {
            drop(state);
            return Self::reject(
                service,
                HealthError::Unavailable("health service is shutting down".into()),
                sink,
                runtime,
            );
        }

        let initial = match Self::lookup(&state, service) {
            Ok(status) => status,
            Err(err) => {
                drop(state);
                return Self::reject(service, err, sink, runtime);
            }
        };

        let watching = state.subscribers.get(service).map_or(0, HashMap::len);
        if self.max_subscribers_per_service > 0 && watching >= self.max_subscribers_per_service {
            drop(state);
            warn!(service, watching, "watch subscriber limit reached");
            return Self::reject(
                service,
                HealthError::Unavailable(format!("too many watchers of service {service:?}")),
                sink,
                runtime,
            );
        }

        let subscriber_id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let notifier = WatchNotifier::new(service, subscriber_id, initial, sink, runtime.clone());
        let finished = CancellationToken::new();
        state.subscribers.entry(service.to_string()).or_default().insert(
            subscriber_id,
            Subscriber {
                notifier: notifier.clone(),
                finished: finished.clone(),
            },
        );
        notifier.start();
        drop(state);

        WATCH_SUBSCRIBERS.with_label_values(&[service]).inc();
        info!(service, subscriber_id, %initial, "watch subscriber added");

        self.spawn_context_guard(&runtime, notifier.clone(), ctx, finished.clone());
        Subscription::attached(notifier, self.me.clone(), finished)
    }
}
