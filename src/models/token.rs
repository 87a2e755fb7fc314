use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::validator::Validator;

/// Length of a base32 (no padding) encoding of 16 random bytes.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activation" => Ok(Self::Activation),
            "authentication" => Ok(Self::Authentication),
            other => Err(format!("unknown token scope: {other}")),
        }
    }
}

/// A freshly issued token. `plaintext` exists only in memory and is handed to
/// the client exactly once; storage only ever sees `hash`.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip_serializing)]
    pub hash: String,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub expiry: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub scope: TokenScope,
}

/// Hex-encoded SHA-256 of a token plaintext.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}
