use std::sync::Once;

use autometrics::prometheus_exporter;
use lazy_static::lazy_static;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref HEALTH_STATUS_UPDATES: IntCounterVec = IntCounterVec::new(
        Opts::new("health_status_updates", "Status changes recorded in the registry"),
        &["service"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_SUBSCRIBERS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("health_watch_subscribers", "Active watch subscriptions"),
        &["service"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_DELIVERIES: IntCounterVec = IntCounterVec::new(
        Opts::new("health_watch_deliveries", "Updates handed to watch consumers"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref CHECK_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("health_check_requests", "Check requests by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_DEFAULT: Once = Once::new();

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(HEALTH_STATUS_UPDATES.clone()),
        Box::new(WATCH_SUBSCRIBERS.clone()),
        Box::new(WATCH_DELIVERIES.clone()),
        Box::new(CHECK_REQUESTS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

/// Serves `/metrics` until the shutdown signal fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    REGISTER_DEFAULT.call_once(|| register_custom_metrics(&REGISTRY));

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!("metrics endpoint listening on 0.0.0.0:{}", port);
    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_metrics())
}

/// Text exposition of the custom registry followed by the autometrics
/// handler metrics.
pub fn gather_metrics() -> String {
    let mut body = encode(&REGISTRY.gather());
    body.push_str(&prometheus_exporter::encode_http_response().into_body());
    body
}

fn encode(families: &[prometheus::proto::MetricFamily]) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(families, &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
