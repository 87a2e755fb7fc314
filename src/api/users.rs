use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use super::extract::JsonBody;
use super::types::{ActivateUserRequest, ApiResponse, RegisterUserRequest, UserData};
use super::{ApiError, AppState};

/// POST /v1/users
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users()
        .register(&request.name, &request.email, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(UserData { user }))))
}

/// PUT /v1/users/activated
pub async fn activate_user(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<ActivateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users().activate(&request.token).await?;
    Ok(Json(ApiResponse::success(UserData { user })))
}
