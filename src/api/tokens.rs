use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use super::extract::JsonBody;
use super::types::{ApiResponse, AuthTokenData, AuthTokenRequest};
use super::{ApiError, AppState};

/// POST /v1/tokens/authentication
pub async fn create_authentication_token(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<AuthTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .users()
        .create_authentication_token(&request.email, &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuthTokenData {
            authentication_token: token,
        })),
    ))
}
