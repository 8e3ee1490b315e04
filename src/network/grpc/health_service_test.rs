use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tonic::Code;
use tonic::Request;
use tonic_health::pb::health_server::Health;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::HealthCheckResponse;

use super::*;
use crate::registry::MockChecker;
use crate::HealthError;
use crate::StaticChecker;
use crate::Status;
use crate::StatusRegistry;

fn request(service: &str) -> Request<HealthCheckRequest> {
    Request::new(HealthCheckRequest {
        service: service.to_string(),
    })
}

async fn open_watch<C: Checker>(
    service: &HealthService<C>,
    name: &str,
) -> WatchResponseStream {
    match service.watch(request(name)).await {
        Ok(response) => response.into_inner(),
        Err(status) => panic!("watch failed: {status:?}"),
    }
}

async fn next_item(stream: &mut WatchResponseStream) -> Option<std::result::Result<HealthCheckResponse, tonic::Status>> {
    timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("no stream item in time")
}

#[tokio::test]
async fn test_check_returns_checker_status() {
    let mut checker = MockChecker::new();
    checker.expect_check().times(1).returning(|service| {
        assert_eq!(service, "db");
        Ok(Status::NotServing)
    });
    let service = HealthService::new(Arc::new(checker));

    let response = service.check(request("db")).await.unwrap().into_inner();

    assert_eq!(response.status, Status::NotServing.as_wire());
}

#[tokio::test]
async fn test_check_maps_not_found() {
    let mut checker = MockChecker::new();
    checker
        .expect_check()
        .returning(|service| Err(HealthError::not_found(service)));
    let service = HealthService::new(Arc::new(checker));

    let status = service.check(request("ghost")).await.unwrap_err();

    assert_eq!(status.code(), Code::NotFound);
    assert!(status.message().contains("ghost"));
}

#[tokio::test]
async fn test_watch_without_watcher_is_unimplemented() {
    let service = HealthService::new(Arc::new(StaticChecker::new(["db"])));

    match service.watch(request("db")).await {
        Err(status) => assert_eq!(status.code(), Code::Unimplemented),
        Ok(_) => panic!("static checker must not support watch"),
    }
    assert_eq!(service.check(request("db")).await.unwrap().into_inner().status, Status::Serving.as_wire());
}

#[tokio::test]
async fn test_watch_streams_registry_changes() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let service = HealthService::with_watcher(registry.clone());

    let mut stream = open_watch(&service, "db").await;
    let first = next_item(&mut stream).await.unwrap().unwrap();
    assert_eq!(first.status, Status::Serving.as_wire());

    registry.set_not_serving("db");
    let second = next_item(&mut stream).await.unwrap().unwrap();
    assert_eq!(second.status, Status::NotServing.as_wire());
}

#[tokio::test]
async fn test_watch_unknown_service_ends_after_not_found() {
    let registry = StatusRegistry::new();
    let service = HealthService::with_watcher(registry.clone());

    let mut stream = open_watch(&service, "ghost").await;
    let status = next_item(&mut stream).await.unwrap().unwrap_err();

    assert_eq!(status.code(), Code::NotFound);
    assert!(next_item(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_dropping_stream_releases_subscriber() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let service = HealthService::with_watcher(registry.clone()).response_buffer_size(1);

    let stream = open_watch(&service, "db").await;
    assert_eq!(registry.subscriber_count("db"), 1);

    drop(stream);
    assert_eq!(registry.subscriber_count("db"), 0);
}

#[tokio::test]
async fn test_registry_shutdown_ends_stream_with_unavailable() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let service = HealthService::with_watcher(registry.clone());
    let mut stream = open_watch(&service, "db").await;
    assert!(next_item(&mut stream).await.unwrap().is_ok());

    registry.shutdown();

    let status = next_item(&mut stream).await.unwrap().unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert!(next_item(&mut stream).await.is_none());
}
