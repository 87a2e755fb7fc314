use sea_orm::{DbErr, SqlErr};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the repositories. Callers match on variants.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    RecordNotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl RepoError {
    /// Maps a unique-constraint violation on `users.email` to `DuplicateEmail`.
    pub(crate) fn from_user_write(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
                Self::DuplicateEmail
            }
            _ => Self::Database(err),
        }
    }
}

/// Bounds a store call by `limit`.
pub(crate) async fn timed<T, F>(limit: Duration, fut: F) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| RepoError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_elapses() {
        let res: Result<(), RepoError> = timed(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(RepoError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_timed_passes_through() {
        let res = timed(Duration::from_secs(1), async { Err::<(), _>(RepoError::EditConflict) }).await;
        assert!(matches!(res, Err(RepoError::EditConflict)));
    }
}
