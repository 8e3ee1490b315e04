use std::sync::Arc;

use d_health::ClientBuilder;
use d_health::HealthError;
use d_health::HealthService;
use d_health::ServerConfig;
use d_health::StaticChecker;
use d_health::Status;
use d_health::StatusRegistry;

use crate::common::TestServer;

#[tokio::test]
async fn test_check_reports_registry_statuses() {
    let registry = StatusRegistry::new();
    registry.set_serving("db");
    let server = TestServer::start(HealthService::with_watcher(registry.clone())).await;
    let client = server.client().await;

    assert_eq!(client.check("").await.unwrap(), Status::Serving);
    assert_eq!(client.check("db").await.unwrap(), Status::Serving);

    registry.set_not_serving("db");
    assert_eq!(client.check("db").await.unwrap(), Status::NotServing);

    registry.set_status("", Status::NotServing);
    assert_eq!(client.check("").await.unwrap(), Status::NotServing);

    server.shutdown().await;
}

#[tokio::test]
async fn test_check_unknown_service_is_not_found() {
    let registry = StatusRegistry::new();
    let server = TestServer::start(HealthService::with_watcher(registry)).await;
    let client = server.client().await;

    let err = client.check("ghost").await.unwrap_err();
    assert!(matches!(err, HealthError::NotFound { service } if service == "ghost"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_static_checker_serves_listed_services() {
    let server = TestServer::start(HealthService::new(Arc::new(StaticChecker::new(["db"])))).await;
    let client = server.client().await;

    assert_eq!(client.check("").await.unwrap(), Status::Serving);
    assert_eq!(client.check("db").await.unwrap(), Status::Serving);
    assert!(matches!(client.check("cache").await, Err(HealthError::NotFound { .. })));

    server.shutdown().await;
}

#[tokio::test]
async fn test_check_with_compression() {
    let registry = StatusRegistry::new();
    registry.set_not_serving("db");
    let config = ServerConfig {
        enable_compression: true,
        ..ServerConfig::default()
    };
    let server = TestServer::start_with_config(HealthService::with_watcher(registry), config).await;
    let client = ClientBuilder::new(server.addr.to_string())
        .enable_compression(true)
        .build()
        .await
        .unwrap();

    assert_eq!(client.check("db").await.unwrap(), Status::NotServing);

    server.shutdown().await;
}
