use std::sync::Arc;
use std::time::Duration;

use d_health::HealthError;
use d_health::HealthService;
use d_health::HealthWatch;
use d_health::StaticChecker;
use d_health::Status;
use d_health::StatusRegistry;
use d_health::WatchContext;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::common::TestServer;

async fn recv(watch: &mut HealthWatch) -> Option<Status> {
    timeout(Duration::from_secs(2), watch.recv())
        .await
        .expect("no status in time")
}

/// Server-side removal happens once the reset reaches the server.
async fn wait_for_subscribers(
    registry: &StatusRegistry,
    service: &str,
    expected: usize,
) {
    for _ in 0..100 {
        if registry.subscriber_count(service) == expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {expected} subscribers of {service:?}, found {}",
        registry.subscriber_count(service)
    );
}

#[tokio::test]
async fn test_watch_follows_status_changes() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let server = TestServer::start(HealthService::with_watcher(registry.clone())).await;
    let client = server.client().await;

    let mut watch = client.watch("db", WatchContext::default()).await.unwrap();
    assert_eq!(recv(&mut watch).await, Some(Status::Serving));
    wait_for_subscribers(&registry, "db", 1).await;

    registry.set_not_serving("db");
    assert_eq!(recv(&mut watch).await, Some(Status::NotServing));
    registry.set_serving("db");
    assert_eq!(recv(&mut watch).await, Some(Status::Serving));

    assert!(watch.stop().await.is_ok());
    assert_eq!(recv(&mut watch).await, None);
    wait_for_subscribers(&registry, "db", 0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_watch_unknown_service_reports_not_found() {
    let registry = StatusRegistry::new();
    let server = TestServer::start(HealthService::with_watcher(registry.clone())).await;
    let client = server.client().await;

    let mut watch = client.watch("ghost", WatchContext::default()).await.unwrap();

    assert_eq!(recv(&mut watch).await, None);
    let err = watch.stop().await.unwrap_err();
    assert!(matches!(err, HealthError::NotFound { service } if service == "ghost"));
    assert_eq!(registry.subscriber_count("ghost"), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_watch_on_static_checker_is_unimplemented() {
    let server = TestServer::start(HealthService::new(Arc::new(StaticChecker::new(["db"])))).await;
    let client = server.client().await;

    let result = client.watch("db", WatchContext::default()).await;
    assert!(matches!(result, Err(HealthError::Unimplemented(_))));

    server.shutdown().await;
}

#[tokio::test]
async fn test_caller_cancellation_ends_watch_on_both_sides() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let server = TestServer::start(HealthService::with_watcher(registry.clone())).await;
    let client = server.client().await;
    let token = CancellationToken::new();

    let mut watch = client.watch("db", WatchContext::new(token.clone())).await.unwrap();
    assert_eq!(recv(&mut watch).await, Some(Status::Serving));
    wait_for_subscribers(&registry, "db", 1).await;

    token.cancel();

    assert_eq!(recv(&mut watch).await, None);
    assert!(matches!(watch.stop().await, Err(HealthError::Cancelled)));
    wait_for_subscribers(&registry, "db", 0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_slow_consumer_converges_on_latest_status() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let server = TestServer::start(HealthService::with_watcher(registry.clone()).response_buffer_size(1)).await;
    let client = server.client().await;

    let mut watch = client.watch("db", WatchContext::default()).await.unwrap();
    wait_for_subscribers(&registry, "db", 1).await;

    for i in 0..100 {
        if i % 2 == 0 {
            registry.set_not_serving("db");
        } else {
            registry.set_serving("db");
        }
    }
    registry.set_not_serving("db");

    let mut last = None;
    let mut previous = None;
    while let Ok(Some(status)) = timeout(Duration::from_millis(300), watch.recv()).await {
        assert_ne!(previous, Some(status), "status delivered twice in a row");
        previous = Some(status);
        last = Some(status);
    }
    assert_eq!(last, Some(Status::NotServing));

    assert!(watch.stop().await.is_ok());
    server.shutdown().await;
}

#[tokio::test]
async fn test_registry_shutdown_terminates_watch_and_server() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let server = TestServer::start(HealthService::with_watcher(registry.clone())).await;
    let client = server.client().await;

    let mut watch = client.watch("db", WatchContext::default()).await.unwrap();
    assert_eq!(recv(&mut watch).await, Some(Status::Serving));

    registry.shutdown();

    assert_eq!(recv(&mut watch).await, None);
    assert!(matches!(watch.stop().await, Err(HealthError::Unavailable(_))));

    server.shutdown().await;
}
