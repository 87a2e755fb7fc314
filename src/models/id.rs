//! Public ids. Numeric primary keys never leave the server: JSON bodies and
//! URLs carry them as hashids strings.

use harsh::Harsh;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

const SALT: &str = "salt is a salt salt";
const MIN_LENGTH: usize = 30;

static HASHER: LazyLock<Harsh> = LazyLock::new(|| {
    Harsh::builder()
        .salt(SALT)
        .length(MIN_LENGTH)
        .build()
        .expect("hashids parameters are valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid ID format")]
pub struct InvalidId;

/// A primary key as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(pub i32);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = u64::try_from(self.0).unwrap_or_default();
        f.write_str(&HASHER.encode(&[raw]))
    }
}

impl FromStr for Id {
    type Err = InvalidId;

    /// Accepts only the canonical encoding of a single positive id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = HASHER.decode(s).map_err(|_| InvalidId)?;
        let [raw] = values.as_slice() else {
            return Err(InvalidId);
        };
        if HASHER.encode(&values) != s {
            return Err(InvalidId);
        }
        i32::try_from(*raw)
            .ok()
            .filter(|id| *id >= 1)
            .map(Self)
            .ok_or(InvalidId)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// `serialize_with` helper for numeric id fields.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub fn serialize<S: Serializer>(id: &i32, serializer: S) -> Result<S::Ok, S::Error> {
    Id(*id).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let encoded = Id(42).to_string();
        assert!(encoded.len() >= MIN_LENGTH);
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(encoded, Id(43).to_string());
        assert_eq!(encoded.parse::<Id>().unwrap(), Id(42));
    }

    #[test]
    fn test_rejects_non_canonical_input() {
        assert_eq!("42".parse::<Id>(), Err(InvalidId));
        assert_eq!("".parse::<Id>(), Err(InvalidId));
        assert_eq!("abc".parse::<Id>(), Err(InvalidId));

        let mut tampered = Id(42).to_string();
        tampered.push('x');
        assert_eq!(tampered.parse::<Id>(), Err(InvalidId));

        let several = HASHER.encode(&[1, 2]);
        assert_eq!(several.parse::<Id>(), Err(InvalidId));

        let zero = HASHER.encode(&[0]);
        assert_eq!(zero.parse::<Id>(), Err(InvalidId));
    }

    #[test]
    fn test_json() {
        let json = serde_json::to_string(&Id(7)).unwrap();
        assert_eq!(json, format!("\"{}\"", Id(7)));
        assert_eq!(serde_json::from_str::<Id>(&json).unwrap(), Id(7));
        assert!(serde_json::from_str::<Id>("7").is_err());
        assert!(serde_json::from_str::<Id>("\"nope\"").is_err());
    }
}
