//! End-to-end tests for the lock endpoints.
//!
//! Fine-grained fairness scenarios live next to the lock implementation;
//! these tests exercise the protocol over real HTTP, including the
//! blocking behavior of `/lock`.

use std::time::Duration;

use canopy_proto::{ExceptionKind, ExceptionResponse, LockRequest};
use canopy_tests::{init_tracing, MockStorage, TestCluster};
use reqwest::StatusCode;
use tokio::time::sleep;

#[tokio::test]
async fn test_lock_roundtrip_on_root() {
    init_tracing();
    let cluster = TestCluster::start().await;

    assert_eq!(cluster.lock("/", false).await, StatusCode::OK);
    assert_eq!(cluster.unlock("/", false).await, StatusCode::OK);
    assert_eq!(cluster.lock("/", true).await, StatusCode::OK);
    assert_eq!(cluster.unlock("/", true).await, StatusCode::OK);
}

#[tokio::test]
async fn test_lock_blocks_until_unlocked() {
    init_tracing();
    let cluster = TestCluster::start().await;
    cluster.create_directory("/d").await;

    assert_eq!(cluster.lock("/d", true).await, StatusCode::OK);

    // A second client's shared lock request stays pending until the
    // exclusive holder releases.
    let addr = cluster.naming.service_addr;
    let pending = tokio::spawn(async move {
        let request = LockRequest {
            path: "/d".to_string(),
            exclusive: false,
        };
        reqwest::Client::new()
            .post(format!("http://{addr}/lock"))
            .json(&request)
            .send()
            .await
            .expect("lock request")
            .status()
    });
    sleep(Duration::from_millis(200)).await;
    assert!(!pending.is_finished(), "shared lock must wait");

    assert_eq!(cluster.unlock("/d", true).await, StatusCode::OK);
    assert_eq!(pending.await.unwrap(), StatusCode::OK);
    assert_eq!(cluster.unlock("/d", false).await, StatusCode::OK);
}

#[tokio::test]
async fn test_lock_missing_path_not_found() {
    init_tracing();
    let cluster = TestCluster::start().await;

    let response = cluster
        .service_post(
            "/lock",
            &LockRequest {
                path: "/missing".to_string(),
                exclusive: false,
            },
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ExceptionResponse = response.json().await.unwrap();
    assert_eq!(body.exception_type, ExceptionKind::FileNotFound);
}

#[tokio::test]
async fn test_unlock_missing_path_is_illegal_argument() {
    init_tracing();
    let cluster = TestCluster::start().await;

    let response = cluster
        .service_post(
            "/unlock",
            &LockRequest {
                path: "/missing".to_string(),
                exclusive: false,
            },
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ExceptionResponse = response.json().await.unwrap();
    assert_eq!(body.exception_type, ExceptionKind::IllegalArgument);
}

#[tokio::test]
async fn test_unlock_without_holding_is_illegal_argument() {
    init_tracing();
    let cluster = TestCluster::start().await;
    cluster.create_directory("/d").await;

    let response = cluster
        .service_post(
            "/unlock",
            &LockRequest {
                path: "/d".to_string(),
                exclusive: true,
            },
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ExceptionResponse = response.json().await.unwrap();
    assert_eq!(body.exception_type, ExceptionKind::IllegalArgument);
}

#[tokio::test]
async fn test_locking_a_file_reported_by_registration() {
    init_tracing();
    let cluster = TestCluster::start().await;
    let replica = MockStorage::spawn().await;
    cluster.register(&replica, &["/f"]).await;

    assert_eq!(cluster.lock("/f", false).await, StatusCode::OK);
    assert_eq!(cluster.unlock("/f", false).await, StatusCode::OK);
}
