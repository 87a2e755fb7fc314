use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

use super::types::{ApiResponse, ValidationFailure};
use crate::db::RepoError;
use crate::models::validator::ValidationErrors;
use crate::services::{MovieError, UserError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),

    FailedValidation(ValidationErrors),

    NotFound,

    MethodNotAllowed(Method),

    EditConflict,

    InvalidCredentials,

    InvalidAuthenticationToken,

    AuthenticationRequired,

    InactiveAccount,

    NotPermitted,

    RateLimitExceeded,

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::FailedValidation(errors) => write!(f, "Validation failed: {errors:?}"),
            Self::NotFound => write!(f, "Not found"),
            Self::MethodNotAllowed(method) => write!(f, "Method not allowed: {method}"),
            Self::EditConflict => write!(f, "Edit conflict"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::InvalidAuthenticationToken => write!(f, "Invalid authentication token"),
            Self::AuthenticationRequired => write!(f, "Authentication required"),
            Self::InactiveAccount => write!(f, "Inactive account"),
            Self::NotPermitted => write!(f, "Not permitted"),
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::FailedValidation(errors) => {
                let body = ApiResponse::fail(ValidationFailure { errors });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            Self::InvalidAuthenticationToken => {
                let body = ApiResponse::error("invalid or missing authentication token");
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                    Json(body),
                )
                    .into_response();
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "the requested resource could not be found".to_string(),
            ),
            Self::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("the {method} method is not supported for this resource"),
            ),
            Self::EditConflict => (
                StatusCode::CONFLICT,
                "unable to update the record due to an edit conflict, please try again"
                    .to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid authentication credentials".to_string(),
            ),
            Self::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                "you must be authenticated to access this resource".to_string(),
            ),
            Self::InactiveAccount => (
                StatusCode::FORBIDDEN,
                "your user account must be activated to access this resource".to_string(),
            ),
            Self::NotPermitted => (
                StatusCode::FORBIDDEN,
                "your user account doesn't have the necessary permissions to access this resource"
                    .to_string(),
            ),
            Self::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
            ),
            Self::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SERVER_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ApiResponse::error(message))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(format!("{err:#}"))
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::RecordNotFound => Self::NotFound,
            RepoError::EditConflict => Self::EditConflict,
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Validation(errors) => Self::FailedValidation(errors),
            UserError::InvalidCredentials => Self::InvalidCredentials,
            UserError::EditConflict => Self::EditConflict,
            UserError::NotFound => Self::NotFound,
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl From<MovieError> for ApiError {
    fn from(err: MovieError) -> Self {
        match err {
            MovieError::Validation(errors) => Self::FailedValidation(errors),
            MovieError::NotFound => Self::NotFound,
            MovieError::EditConflict => Self::EditConflict,
            MovieError::Repo(e) => Self::InternalError(e.to_string()),
        }
    }
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn validation(key: &str, message: &str) -> Self {
        Self::FailedValidation(ValidationErrors::from([(
            key.to_string(),
            message.to_string(),
        )]))
    }
}
