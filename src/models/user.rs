use serde::Serialize;

use super::validator::{EMAIL_RX, Validator};

/// A persisted account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(serialize_with = "super::id::serialize")]
    pub id: i32,
    pub created_at: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

/// Who is making the current request.
///
/// `Anonymous` carries no account data, so it can never be activated and
/// never holds permissions.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user),
        }
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(
        EMAIL_RX.is_match(email),
        "email",
        "must be a valid email address",
    );
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= 8,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= 72,
        "password",
        "must not be more than 72 bytes long",
    );
}

pub fn validate_registration(v: &mut Validator, name: &str, email: &str, password: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= 500,
        "name",
        "must not be more than 500 bytes long",
    );
    validate_email(v, email);
    validate_password_plaintext(v, password);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_registration() {
        let mut v = Validator::new();
        validate_registration(&mut v, "Alice", "alice@example.com", "pa55word");
        assert!(v.valid());

        let mut v = Validator::new();
        validate_registration(&mut v, "", "nope", "short");
        let errors = v.finish().unwrap_err();
        assert_eq!(errors["name"], "must be provided");
        assert_eq!(errors["email"], "must be a valid email address");
        assert_eq!(errors["password"], "must be at least 8 bytes long");
    }

    #[test]
    fn test_anonymous_has_no_user() {
        assert!(Identity::Anonymous.is_anonymous());
        assert!(Identity::Anonymous.user().is_none());
    }
}
