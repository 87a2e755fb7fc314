//! `SeaORM` implementation of the `TokenService` trait.

use async_trait::async_trait;
use chrono::TimeDelta;

use crate::db::Store;
use crate::models::token::{Token, TokenScope};
use crate::services::token_service::{TokenError, TokenService, generate_token};

pub struct SeaOrmTokenService {
    store: Store,
}

impl SeaOrmTokenService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenService for SeaOrmTokenService {
    async fn create_new(
        &self,
        user_id: i32,
        ttl: TimeDelta,
        scope: TokenScope,
    ) -> Result<Token, TokenError> {
        let token = generate_token(user_id, ttl, scope)?;
        self.store.tokens().insert(&token).await?;
        Ok(token)
    }

    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: i32,
    ) -> Result<(), TokenError> {
        self.store
            .tokens()
            .delete_all_for_user(scope, user_id)
            .await?;
        Ok(())
    }
}
