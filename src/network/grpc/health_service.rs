//! `grpc.health.v1.Health` service backed by a [`Checker`] and, when
//! available, a [`Watcher`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use autometrics::autometrics;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;
use tonic::Request;
use tonic::Response;
use tonic::Status as RpcStatus;
use tonic_health::pb::health_server::Health;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::HealthCheckResponse;
use tracing::debug;

use crate::metrics::CHECK_REQUESTS;
use crate::Checker;
use crate::HealthError;
use crate::Subscription;
use crate::WatchContext;
use crate::WatchSink;
use crate::WatchUpdate;
use crate::Watcher;
use crate::API_SLO;

type ResponseItem = std::result::Result<HealthCheckResponse, RpcStatus>;

const DEFAULT_RESPONSE_BUFFER_SIZE: usize = 4;

pub struct HealthService<C: Checker> {
    checker: Arc<C>,
    watcher: Option<Arc<dyn Watcher>>,
    response_buffer_size: usize,
}

impl<C: Checker> std::fmt::Debug for HealthService<C> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HealthService")
            .field("watch_supported", &self.watcher.is_some())
            .field("response_buffer_size", &self.response_buffer_size)
            .finish()
    }
}

impl<C: Checker> HealthService<C> {
    /// Serves `Check` only; `Watch` answers `Unimplemented`.
    pub fn new(checker: Arc<C>) -> Self {
        Self {
            checker,
            watcher: None,
            response_buffer_size: DEFAULT_RESPONSE_BUFFER_SIZE,
        }
    }

    /// Capacity of each watch stream's response channel.
    pub fn response_buffer_size(
        mut self,
        size: usize,
    ) -> Self {
        self.response_buffer_size = size.max(1);
        self
    }
}

impl<W: Watcher> HealthService<W> {
    /// Serves both `Check` and `Watch` from `watcher`.
    pub fn with_watcher(watcher: Arc<W>) -> Self {
        Self {
            checker: watcher.clone(),
            watcher: Some(watcher),
            response_buffer_size: DEFAULT_RESPONSE_BUFFER_SIZE,
        }
    }
}

#[async_trait]
impl<C: Checker> Health for HealthService<C> {
    type WatchStream = WatchResponseStream;

    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip(self))]
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> std::result::Result<Response<HealthCheckResponse>, RpcStatus> {
        let service = request.into_inner().service;
        match self.checker.check(&service).await {
            Ok(status) => {
                CHECK_REQUESTS.with_label_values(&[status.as_str()]).inc();
                Ok(Response::new(HealthCheckResponse {
                    status: status.as_wire(),
                }))
            }
            Err(err) => {
                debug!(service = %service, error = %err, "check failed");
                CHECK_REQUESTS.with_label_values(&["error"]).inc();
                Err(err.into())
            }
        }
    }

    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip(self))]
    async fn watch(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> std::result::Result<Response<Self::WatchStream>, RpcStatus> {
        let Some(watcher) = &self.watcher else {
            return Err(HealthError::Unimplemented("health checker does not support watching".into()).into());
        };

        let service = request.into_inner().service;
        let (tx, rx) = mpsc::channel(self.response_buffer_size);
        // The stream owns the subscription; a client that goes away drops the
        // stream and thereby stops the watch.
        let subscription = watcher.watch(&service, WatchContext::default(), Arc::new(ResponseSink { tx }));

        Ok(Response::new(WatchResponseStream {
            inner: ReceiverStream::new(rx),
            _subscription: subscription,
            terminated: false,
        }))
    }
}

/// Translates watch deliveries into gRPC response items.
struct ResponseSink {
    tx: mpsc::Sender<ResponseItem>,
}

#[async_trait]
impl WatchSink for ResponseSink {
    async fn deliver(
        &self,
        update: WatchUpdate,
    ) {
        let item = update
            .map(|status| HealthCheckResponse {
                status: status.as_wire(),
            })
            .map_err(RpcStatus::from);
        if self.tx.send(item).await.is_err() {
            debug!("watch stream closed by client");
        }
    }
}

/// Response stream of one `Watch` call.
///
/// Ends right after yielding a terminal error.
pub struct WatchResponseStream {
    inner: ReceiverStream<ResponseItem>,
    _subscription: Subscription,
    terminated: bool,
}

impl Stream for WatchResponseStream {
    type Item = ResponseItem;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(Err(_))) = &polled {
            self.terminated = true;
        }
        polled
    }
}
