//! `SeaORM` implementation of the `UserService` trait.

use async_trait::async_trait;
use chrono::TimeDelta;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::{RepoError, Store};
use crate::models::id::Id;
use crate::models::permission::Permissions;
use crate::models::token::{Token, TokenScope, validate_token_plaintext};
use crate::models::user::{User, validate_email, validate_password_plaintext, validate_registration};
use crate::models::validator::Validator;
use crate::services::background::BackgroundTasks;
use crate::services::mailer::{Mailer, USER_WELCOME};
use crate::services::password;
use crate::services::token_service::TokenService;
use crate::services::user_service::{UserError, UserService};

pub struct SeaOrmUserService {
    store: Store,
    tokens: Arc<dyn TokenService>,
    mailer: Arc<dyn Mailer>,
    background: BackgroundTasks,
    security: SecurityConfig,
}

impl SeaOrmUserService {
    #[must_use]
    pub fn new(
        store: Store,
        tokens: Arc<dyn TokenService>,
        mailer: Arc<dyn Mailer>,
        background: BackgroundTasks,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            background,
            security,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, UserError> {
        let email = normalize_email(email);

        let mut v = Validator::new();
        validate_registration(&mut v, name, &email, password);
        v.finish().map_err(UserError::Validation)?;

        let mut user = User {
            id: 0,
            created_at: String::new(),
            name: name.to_string(),
            email,
            password_hash: password::hash(password, &self.security).await?,
            activated: false,
            version: 0,
        };
        self.store.users().insert(&mut user).await?;
        info!(user_id = user.id, "User registered");

        let token = self
            .tokens
            .create_new(user.id, TimeDelta::days(3), TokenScope::Activation)
            .await?;

        let mailer = self.mailer.clone();
        let recipient = user.email.clone();
        let data = json!({ "id": Id(user.id).to_string(), "token": token.plaintext });
        let user_id = user.id;
        self.background.spawn("welcome email", async move {
            mailer
                .send(&recipient, USER_WELCOME, &data)
                .await
                .map_err(|e| anyhow::anyhow!("sending welcome email to user {user_id}: {e}"))
        });

        Ok(user)
    }

    async fn activate(&self, token_plaintext: &str) -> Result<User, UserError> {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, token_plaintext);
        v.finish().map_err(UserError::Validation)?;

        let mut user = match self
            .store
            .users()
            .get_for_token(TokenScope::Activation, token_plaintext)
            .await
        {
            Ok(user) => user,
            Err(RepoError::RecordNotFound) => {
                return Err(UserError::field("token", "invalid or expired token"));
            }
            Err(e) => return Err(e.into()),
        };

        user.activated = true;
        self.store.users().update(&mut user).await?;
        info!(user_id = user.id, "User activated");

        let tokens = self.tokens.clone();
        let user_id = user.id;
        self.background.spawn("activation token cleanup", async move {
            tokens
                .delete_all_for_user(TokenScope::Activation, user_id)
                .await
                .map_err(|e| anyhow::anyhow!("deleting activation tokens of user {user_id}: {e}"))
        });

        Ok(user)
    }

    async fn create_authentication_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Token, UserError> {
        let email = normalize_email(email);

        let mut v = Validator::new();
        validate_email(&mut v, &email);
        validate_password_plaintext(&mut v, password);
        v.finish().map_err(UserError::Validation)?;

        let user = match self.store.users().get_by_email(&email).await {
            Ok(user) => user,
            Err(RepoError::RecordNotFound) => return Err(UserError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !password::matches(password, &user.password_hash).await? {
            return Err(UserError::InvalidCredentials);
        }

        Ok(self
            .tokens
            .create_new(user.id, TimeDelta::hours(24), TokenScope::Authentication)
            .await?)
    }

    async fn get_for_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<Option<User>, UserError> {
        match self.store.users().get_for_token(scope, plaintext).await {
            Ok(user) => Ok(Some(user)),
            Err(RepoError::RecordNotFound) => Ok(None),
            Err(e) => Err(UserError::Repo(e)),
        }
    }

    async fn permissions_for(&self, user_id: i32) -> Result<Permissions, UserError> {
        self.store
            .permissions()
            .get_all_for_user(user_id)
            .await
            .map_err(UserError::Repo)
    }

    async fn grant_permissions(&self, email: &str, codes: &[String]) -> Result<User, UserError> {
        let user = self.store.users().get_by_email(&normalize_email(email)).await?;
        self.store
            .permissions()
            .add_for_user(user.id, codes)
            .await
            .map_err(|e| match e {
                RepoError::RecordNotFound => {
                    UserError::field("codes", "must only contain known permission codes")
                }
                other => UserError::Repo(other),
            })?;
        info!(user_id = user.id, ?codes, "Permissions granted");
        Ok(user)
    }
}
