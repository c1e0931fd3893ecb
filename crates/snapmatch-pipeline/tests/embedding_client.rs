//! HTTP embedding client against a local fake service.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{serve, Json, Router};
use serde_json::{json, Value};
use snapmatch_pipeline::{EmbeddingService, HttpEmbeddingClient, PipelineError};
use tokio::net::TcpListener;

async fn extract(Json(body): Json<Value>) -> (StatusCode, String) {
    let url = body["image_url"].as_str().unwrap_or_default();
    match url {
        "https://cdn/one.jpg" => (
            StatusCode::OK,
            json!({
                "embeddings": [
                    {"vector": [0.1, 0.2, 0.3], "confidence": 0.97, "bbox": [10, 20, 60, 90]}
                ]
            })
            .to_string(),
        ),
        "https://cdn/empty.jpg" => (StatusCode::OK, json!({"embeddings": []}).to_string()),
        "https://cdn/garbled.jpg" => (StatusCode::OK, "<html>oops</html>".to_string()),
        "https://cdn/wrong-shape.jpg" => (StatusCode::OK, json!({"faces": []}).to_string()),
        "https://cdn/missing.jpg" => (StatusCode::NOT_FOUND, "image not found".to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "model crashed".to_string()),
    }
}

async fn start_server() -> String {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/api/extract-embeddings", post(extract));
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(&addr).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

fn client(base: &str) -> HttpEmbeddingClient {
    HttpEmbeddingClient::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_extract_parses_detections() {
    let base = start_server().await;
    let detections = client(&base).extract("https://cdn/one.jpg").await.unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].vector, vec![0.1, 0.2, 0.3]);
    assert!((detections[0].confidence - 0.97).abs() < 1e-6);
    let bbox = detections[0].bbox.unwrap();
    assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (10.0, 20.0, 50.0, 70.0));
}

#[tokio::test]
async fn test_extract_empty_means_no_face() {
    let base = start_server().await;
    let detections = client(&base).extract("https://cdn/empty.jpg").await.unwrap();
    assert!(detections.is_empty());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let base = start_server().await;
    let err = client(&base)
        .extract("https://cdn/anything.jpg")
        .await
        .unwrap_err();
    match &err {
        PipelineError::Http { status, message, .. } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "model crashed");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_client_error_is_not_transient() {
    let base = start_server().await;
    let err = client(&base)
        .extract("https://cdn/missing.jpg")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Http { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_malformed_bodies() {
    let base = start_server().await;
    let client = client(&base);

    let garbled = client.extract("https://cdn/garbled.jpg").await.unwrap_err();
    assert!(garbled.is_malformed());

    let wrong_shape = client
        .extract("https://cdn/wrong-shape.jpg")
        .await
        .unwrap_err();
    assert!(wrong_shape.is_malformed());
}

#[tokio::test]
async fn test_unreachable_service_is_transient() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = client(&format!("http://127.0.0.1:{port}"))
        .extract("https://cdn/one.jpg")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_health() {
    let base = start_server().await;
    assert!(client(&base).health().await.is_ok());
}
