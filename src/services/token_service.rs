//! Domain service for issuing and revoking scoped tokens.

use chrono::{TimeDelta, Utc};
use data_encoding::BASE32_NOPAD;
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;

use crate::db::RepoError;
use crate::models::token::{Token, TokenScope, hash_plaintext};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Random source failure: {0}")]
    Random(String),

    #[error("Invalid token lifetime")]
    InvalidTtl,

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Builds a token from 16 bytes of OS randomness. Nothing is persisted.
pub fn generate_token(user_id: i32, ttl: TimeDelta, scope: TokenScope) -> Result<Token, TokenError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::Random(e.to_string()))?;

    let plaintext = BASE32_NOPAD.encode(&bytes);
    let expiry = Utc::now()
        .checked_add_signed(ttl)
        .ok_or(TokenError::InvalidTtl)?;

    Ok(Token {
        hash: hash_plaintext(&plaintext),
        plaintext,
        user_id,
        expiry,
        scope,
    })
}

#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Generates and stores a token, returning it with its plaintext.
    async fn create_new(
        &self,
        user_id: i32,
        ttl: TimeDelta,
        scope: TokenScope,
    ) -> Result<Token, TokenError>;

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i32)
    -> Result<(), TokenError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::TOKEN_PLAINTEXT_LEN;

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token(3, TimeDelta::hours(24), TokenScope::Authentication).unwrap();
        assert_eq!(token.plaintext.len(), TOKEN_PLAINTEXT_LEN);
        assert_eq!(token.hash, hash_plaintext(&token.plaintext));
        assert!(token.expiry > Utc::now() + TimeDelta::hours(23));

        let other = generate_token(3, TimeDelta::hours(24), TokenScope::Authentication).unwrap();
        assert_ne!(token.plaintext, other.plaintext);
    }
}
