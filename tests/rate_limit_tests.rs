use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use greenlight::config::Config;
use http_body_util::BodyExt;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceExt;

async fn spawn_app(enabled: bool) -> Router {
    let db_path =
        std::env::temp_dir().join(format!("greenlight-limit-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.database.url = format!("sqlite:{}", db_path.display());
    config.limiter.enabled = enabled;
    config.limiter.rps = 1.0;
    config.limiter.burst = 2;

    let state = greenlight::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");
    greenlight::api::router(state)
}

fn from(addr: &str) -> Request<Body> {
    let addr: SocketAddr = addr.parse().unwrap();
    Request::builder()
        .uri("/v1/healthcheck")
        .extension(ConnectInfo(addr))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_burst_then_refill() {
    let app = spawn_app(true).await;

    for _ in 0..2 {
        let response = app.clone().oneshot(from("10.0.0.1:5000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(from("10.0.0.1:5001")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "rate limit exceeded");

    // Another client has its own bucket.
    let response = app.clone().oneshot(from("10.0.0.2:5000")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = app.oneshot(from("10.0.0.1:5000")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_peer_address_is_a_server_error() {
    let app = spawn_app(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/healthcheck")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_disabled_limiter_forwards_everything() {
    let app = spawn_app(false).await;

    for _ in 0..10 {
        let response = app.clone().oneshot(from("10.0.0.1:5000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
