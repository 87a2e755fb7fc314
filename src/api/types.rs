use serde::{Deserialize, Serialize};

use crate::models::filters::Metadata;
use crate::models::movie::Movie;
use crate::models::token::Token;
use crate::models::user::User;
use crate::models::validator::ValidationErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Fail,
    Error,
}

/// Envelope wrapped around every JSON response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            status: Status::Success,
            message: None,
            data: Some(data),
        }
    }

    pub const fn fail(data: T) -> Self {
        Self {
            status: Status::Fail,
            message: None,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationFailure {
    pub errors: ValidationErrors,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateUserRequest {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthTokenRequest {
    pub email: String,
    pub password: String,
}

/// Raw query string of `GET /v1/movies`. Numbers are parsed by the handler
/// so that bad values become field errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListMoviesParams {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MovieData {
    pub movie: Movie,
}

#[derive(Debug, Serialize)]
pub struct MovieListData {
    pub metadata: Metadata,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct AuthTokenData {
    pub authentication_token: Token,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub environment: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub system_info: SystemInfo,
}
