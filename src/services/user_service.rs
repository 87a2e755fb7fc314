//! Domain service for accounts: registration, activation, credential
//! exchange and permission grants.

use thiserror::Error;

use crate::db::RepoError;
use crate::models::permission::Permissions;
use crate::models::token::{Token, TokenScope};
use crate::models::user::User;
use crate::models::validator::ValidationErrors;
use crate::services::token_service::TokenError;

/// Errors specific to user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Edit conflict")]
    EditConflict,

    #[error("User not found")]
    NotFound,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Repo(RepoError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserError {
    pub(crate) fn field(key: &str, message: &str) -> Self {
        Self::Validation(ValidationErrors::from([(key.to_string(), message.to_string())]))
    }
}

impl From<RepoError> for UserError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::RecordNotFound => Self::NotFound,
            RepoError::EditConflict => Self::EditConflict,
            RepoError::DuplicateEmail => {
                Self::field("email", "a user with this email address already exists")
            }
            other => Self::Repo(other),
        }
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates an unactivated account and mails an activation token in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] for bad input or an email already in use.
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, UserError>;

    /// Consumes an activation token. The user's other activation tokens are
    /// removed in the background.
    async fn activate(&self, token_plaintext: &str) -> Result<User, UserError>;

    /// Exchanges email and password for a 24 hour authentication token.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::InvalidCredentials`] for an unknown email or a wrong password.
    async fn create_authentication_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Token, UserError>;

    /// Resolves the owner of an unexpired token; `None` when there is none.
    async fn get_for_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<Option<User>, UserError>;

    async fn permissions_for(&self, user_id: i32) -> Result<Permissions, UserError>;

    async fn grant_permissions(&self, email: &str, codes: &[String]) -> Result<User, UserError>;
}
