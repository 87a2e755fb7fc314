use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait, Set,
    sea_query::Expr,
};
use std::time::Duration;

use crate::db::error::{RepoError, timed};
use crate::entities::{tokens, users};
use crate::models::token::{TokenScope, hash_plaintext};
use crate::models::user::User;

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            created_at: model.created_at,
            name: model.name,
            email: model.email,
            password_hash: model.password_hash,
            activated: model.activated,
            version: model.version,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// Persists a new user and fills in `id`, `created_at` and `version`.
    pub async fn insert(&self, user: &mut User) -> Result<(), RepoError> {
        let created_at = Utc::now().to_rfc3339();
        let model = users::ActiveModel {
            name: Set(user.name.clone()),
            email: Set(user.email.clone()),
            password_hash: Set(user.password_hash.clone()),
            activated: Set(user.activated),
            version: Set(1),
            created_at: Set(created_at),
            ..Default::default()
        };

        let saved = timed(self.timeout, async {
            model
                .insert(&self.conn)
                .await
                .map_err(RepoError::from_user_write)
        })
        .await?;

        user.id = saved.id;
        user.created_at = saved.created_at;
        user.version = saved.version;
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<User, RepoError> {
        if id < 1 {
            return Err(RepoError::RecordNotFound);
        }
        timed(self.timeout, async {
            users::Entity::find_by_id(id)
                .one(&self.conn)
                .await?
                .map(User::from)
                .ok_or(RepoError::RecordNotFound)
        })
        .await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, RepoError> {
        timed(self.timeout, async {
            users::Entity::find()
                .filter(users::Column::Email.eq(email))
                .one(&self.conn)
                .await?
                .map(User::from)
                .ok_or(RepoError::RecordNotFound)
        })
        .await
    }

    /// Writes every mutable column if the stored version still matches
    /// `user.version`, then bumps `user.version`.
    pub async fn update(&self, user: &mut User) -> Result<(), RepoError> {
        let result = timed(self.timeout, async {
            users::Entity::update_many()
                .col_expr(users::Column::Name, Expr::value(user.name.clone()))
                .col_expr(users::Column::Email, Expr::value(user.email.clone()))
                .col_expr(
                    users::Column::PasswordHash,
                    Expr::value(user.password_hash.clone()),
                )
                .col_expr(users::Column::Activated, Expr::value(user.activated))
                .col_expr(
                    users::Column::Version,
                    Expr::col(users::Column::Version).add(1),
                )
                .filter(users::Column::Id.eq(user.id))
                .filter(users::Column::Version.eq(user.version))
                .exec(&self.conn)
                .await
                .map_err(RepoError::from_user_write)
        })
        .await?;

        if result.rows_affected == 0 {
            return Err(RepoError::EditConflict);
        }
        user.version += 1;
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<(), RepoError> {
        if id < 1 {
            return Err(RepoError::RecordNotFound);
        }
        let result = timed(self.timeout, async {
            Ok(users::Entity::delete_by_id(id).exec(&self.conn).await?)
        })
        .await?;

        if result.rows_affected == 0 {
            return Err(RepoError::RecordNotFound);
        }
        Ok(())
    }

    /// Resolves the owner of an unexpired token with the given scope.
    pub async fn get_for_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<User, RepoError> {
        let hash = hash_plaintext(plaintext);
        let now = Utc::now().timestamp_millis();

        timed(self.timeout, async {
            users::Entity::find()
                .join(JoinType::InnerJoin, users::Relation::Tokens.def())
                .filter(tokens::Column::Hash.eq(hash))
                .filter(tokens::Column::Scope.eq(scope.as_str()))
                .filter(tokens::Column::Expiry.gt(now))
                .one(&self.conn)
                .await?
                .map(User::from)
                .ok_or(RepoError::RecordNotFound)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_store;

    fn new_user(email: &str) -> User {
        User {
            id: 0,
            created_at: String::new(),
            name: "Alice".to_string(),
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            activated: false,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let repo = test_store().await.users();
        let mut user = new_user("alice@example.com");
        repo.insert(&mut user).await.unwrap();

        assert!(user.id > 0);
        assert_eq!(user.version, 1);

        let fetched = repo.get_by_email("alice@example.com").await.unwrap();
        assert_eq!(fetched.id, user.id);
        assert!(!fetched.activated);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let repo = test_store().await.users();
        repo.insert(&mut new_user("dup@example.com")).await.unwrap();

        let err = repo
            .insert(&mut new_user("dup@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let repo = test_store().await.users();
        let mut user = new_user("bob@example.com");
        repo.insert(&mut user).await.unwrap();

        let mut stale = user.clone();
        user.activated = true;
        repo.update(&mut user).await.unwrap();
        assert_eq!(user.version, 2);

        stale.name = "Mallory".to_string();
        let err = repo.update(&mut stale).await.unwrap_err();
        assert!(matches!(err, RepoError::EditConflict));

        let stored = repo.get(user.id).await.unwrap();
        assert_eq!(stored.name, "Alice");
        assert!(stored.activated);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let repo = test_store().await.users();
        let mut user = new_user("carol@example.com");
        repo.insert(&mut user).await.unwrap();

        repo.delete(user.id).await.unwrap();
        assert!(matches!(repo.delete(user.id).await, Err(RepoError::RecordNotFound)));
        assert!(matches!(repo.delete(user.id).await, Err(RepoError::RecordNotFound)));
        assert!(matches!(repo.get(user.id).await, Err(RepoError::RecordNotFound)));
        assert!(matches!(repo.delete(0).await, Err(RepoError::RecordNotFound)));

        // The address is free again.
        repo.insert(&mut new_user("carol@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = test_store().await.users();
        assert!(matches!(repo.get(0).await, Err(RepoError::RecordNotFound)));
        assert!(matches!(repo.get(42).await, Err(RepoError::RecordNotFound)));
    }
}
