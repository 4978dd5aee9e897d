//! End-to-end tests for storage replica registration.

use canopy_proto::{ExceptionKind, ExceptionResponse, PathRequest, RegisterRequest};
use canopy_tests::{init_tracing, MockStorage, TestCluster};
use reqwest::StatusCode;

#[tokio::test]
async fn test_registration_reconciles_file_sets() {
    init_tracing();
    let cluster = TestCluster::start().await;
    let r1 = MockStorage::spawn().await;
    let r2 = MockStorage::spawn().await;

    let (status, response) = cluster.register(&r1, &["/a", "/b"]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.files.is_empty());

    // R2 also claims /a; it must delete its local copy.
    let (status, response) = cluster.register(&r2, &["/a", "/c"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.files, vec!["/a"]);

    assert_eq!(cluster.list("/").await, vec!["a", "b", "c"]);

    // /a stays with R1, /c belongs to R2.
    let (_, info): (_, serde_json::Value) = cluster
        .service_call("/get_storage", &PathRequest::new("/a"))
        .await;
    assert_eq!(info["server_port"], r1.addr.client_port);
    let (_, info): (_, serde_json::Value) = cluster
        .service_call("/get_storage", &PathRequest::new("/c"))
        .await;
    assert_eq!(info["server_port"], r2.addr.client_port);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    init_tracing();
    let cluster = TestCluster::start().await;
    let replica = MockStorage::spawn().await;

    let (status, _) = cluster.register(&replica, &[]).await;
    assert_eq!(status, StatusCode::OK);

    let request = RegisterRequest {
        storage_ip: replica.addr.host.clone(),
        client_port: replica.addr.client_port,
        command_port: replica.addr.command_port,
        files: Vec::new(),
    };
    let url = format!("http://{}/register", cluster.naming.registration_addr);
    let response = reqwest::Client::new()
        .post(url)
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ExceptionResponse = response.json().await.unwrap();
    assert_eq!(body.exception_type, ExceptionKind::IllegalState);
}

#[tokio::test]
async fn test_registration_rejects_existing_tree_nodes() {
    init_tracing();
    let cluster = TestCluster::start().await;
    let r1 = MockStorage::spawn().await;
    let r2 = MockStorage::spawn().await;

    cluster.register(&r1, &["/shared/f"]).await;
    cluster.create_directory("/dir").await;

    // An exact collision of either kind and a path under a file are all
    // rejected; a fresh path is accepted.
    let (status, response) = cluster
        .register(&r2, &["/shared/f", "/dir", "/shared/f/nested", "/fresh"])
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut rejected = response.files;
    rejected.sort();
    assert_eq!(rejected, vec!["/dir", "/shared/f", "/shared/f/nested"]);

    let (_, info): (_, serde_json::Value) = cluster
        .service_call("/get_storage", &PathRequest::new("/fresh"))
        .await;
    assert_eq!(info["server_port"], r2.addr.client_port);
}

#[tokio::test]
async fn test_registration_rejects_malformed_paths() {
    init_tracing();
    let cluster = TestCluster::start().await;
    let replica = MockStorage::spawn().await;

    let (status, response) = cluster
        .register(&replica, &["relative/path", "/ok", "/bad:colon"])
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut rejected = response.files;
    rejected.sort();
    assert_eq!(rejected, vec!["/bad:colon", "relative/path"]);
}

#[tokio::test]
async fn test_registration_materializes_directories() {
    init_tracing();
    let cluster = TestCluster::start().await;
    let replica = MockStorage::spawn().await;

    cluster.register(&replica, &["/x/y/f"]).await;

    assert_eq!(cluster.list("/").await, vec!["x"]);
    assert_eq!(cluster.list("/x").await, vec!["y"]);
    assert_eq!(cluster.list("/x/y").await, vec!["f"]);

    let (_, info): (_, serde_json::Value) = cluster
        .service_call("/get_storage", &PathRequest::new("/x/y/f"))
        .await;
    assert_eq!(info["server_port"], replica.addr.client_port);
}
