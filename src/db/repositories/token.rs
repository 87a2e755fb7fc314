use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::time::Duration;

use crate::db::error::{RepoError, timed};
use crate::entities::tokens;
use crate::models::token::{Token, TokenScope};

pub struct TokenRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// Stores the hash of `token`. The plaintext never reaches storage.
    pub async fn insert(&self, token: &Token) -> Result<(), RepoError> {
        let model = tokens::ActiveModel {
            hash: Set(token.hash.clone()),
            user_id: Set(token.user_id),
            expiry: Set(token.expiry.timestamp_millis()),
            scope: Set(token.scope.as_str().to_string()),
        };

        timed(self.timeout, async {
            tokens::Entity::insert(model).exec(&self.conn).await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: i32,
    ) -> Result<u64, RepoError> {
        timed(self.timeout, async {
            let result = tokens::Entity::delete_many()
                .filter(tokens::Column::Scope.eq(scope.as_str()))
                .filter(tokens::Column::UserId.eq(user_id))
                .exec(&self.conn)
                .await?;
            Ok(result.rows_affected)
        })
        .await
    }
}
