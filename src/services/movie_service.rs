//! Domain service for the movie catalogue.

use thiserror::Error;

use crate::db::RepoError;
use crate::models::filters::Metadata;
use crate::models::movie::{Movie, MovieInput, MovieQuery};
use crate::models::validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum MovieError {
    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("Movie not found")]
    NotFound,

    #[error("Edit conflict")]
    EditConflict,

    #[error("Database error: {0}")]
    Repo(RepoError),
}

impl From<RepoError> for MovieError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::RecordNotFound => Self::NotFound,
            RepoError::EditConflict => Self::EditConflict,
            other => Self::Repo(other),
        }
    }
}

#[async_trait::async_trait]
pub trait MovieService: Send + Sync {
    async fn create(&self, input: MovieInput) -> Result<Movie, MovieError>;

    async fn get(&self, id: i32) -> Result<Movie, MovieError>;

    /// Applies a partial update. When `expected_version` is given and does
    /// not match the stored row the update is refused with `EditConflict`.
    async fn update(
        &self,
        id: i32,
        patch: MovieInput,
        expected_version: Option<i32>,
    ) -> Result<Movie, MovieError>;

    async fn delete(&self, id: i32) -> Result<(), MovieError>;

    /// Filter values must already be validated.
    async fn list(&self, query: MovieQuery) -> Result<(Vec<Movie>, Metadata), MovieError>;
}
