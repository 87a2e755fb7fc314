use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::TimeDelta;
use greenlight::api::AppState;
use greenlight::config::Config;
use greenlight::models::Id;
use greenlight::models::token::TokenScope;
use greenlight::services::TokenService;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn spawn_app() -> (Arc<AppState>, Router) {
    let db_path =
        std::env::temp_dir().join(format!("greenlight-flow-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.database.url = format!("sqlite:{}", db_path.display());
    config.limiter.enabled = false;

    let state = greenlight::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");
    let router = greenlight::api::router(state.clone());
    (state, router)
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn alice() -> Value {
    json!({"name": "Alice Smith", "email": "Alice@Example.com ", "password": "pa55word1234"})
}

#[tokio::test]
async fn test_register_activate_and_authenticate() {
    let (state, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/users", &alice()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().get(header::LOCATION).is_none());
    let json = body_json(response).await;
    let user = &json["data"]["user"];
    let Id(id) = user["id"].as_str().unwrap().parse::<Id>().unwrap();
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["activated"], false);
    assert!(user.get("password_hash").is_none());

    // The welcome mail goes out in the background.
    assert!(state.shared.background.drain(Duration::from_secs(5)).await);

    let activation = state
        .shared
        .token_service
        .create_new(id, TimeDelta::days(3), TokenScope::Activation)
        .await
        .unwrap();

    let body = json!({"token": activation.plaintext});
    let response = app
        .clone()
        .oneshot(json_request("PUT", "/v1/users/activated", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["user"]["activated"], true);
    assert_eq!(json["data"]["user"]["version"], 2);

    assert!(state.shared.background.drain(Duration::from_secs(5)).await);

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/v1/users/activated", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["data"]["errors"]["token"],
        "invalid or expired token"
    );

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/tokens/authentication",
            &json!({"email": "alice@example.com", "password": "pa55word1234"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let token = json["data"]["authentication_token"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(token.len(), 26);
    assert!(json["data"]["authentication_token"]["expiry"].is_string());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/healthcheck")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_email_is_a_validation_failure() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/users", &alice()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/users",
            &json!({"name": "Other", "email": "alice@example.com", "password": "different-pass"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["data"]["errors"]["email"],
        "a user with this email address already exists"
    );
}

#[tokio::test]
async fn test_registration_validation() {
    let (_, app) = spawn_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/users",
            &json!({"name": "", "email": "not-an-email", "password": "short"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["status"], "fail");
    assert_eq!(json["data"]["errors"]["name"], "must be provided");
    assert_eq!(json["data"]["errors"]["email"], "must be a valid email address");
    assert_eq!(
        json["data"]["errors"]["password"],
        "must be at least 8 bytes long"
    );
}

#[tokio::test]
async fn test_invalid_credentials() {
    let (_, app) = spawn_app().await;

    app.clone()
        .oneshot(json_request("POST", "/v1/users", &alice()))
        .await
        .unwrap();

    for body in [
        json!({"email": "alice@example.com", "password": "wrong-password"}),
        json!({"email": "nobody@example.com", "password": "pa55word1234"}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/tokens/authentication", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert_eq!(
            body_json(response).await["message"],
            "invalid authentication credentials"
        );
    }
}

#[tokio::test]
async fn test_malformed_activation_token() {
    let (_, app) = spawn_app().await;

    let response = app
        .oneshot(json_request(
            "PUT",
            "/v1/users/activated",
            &json!({"token": "too-short"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["data"]["errors"]["token"],
        "must be 26 bytes long"
    );
}
