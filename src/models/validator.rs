use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

/// Field name -> first failure message for that field.
pub type ValidationErrors = BTreeMap<String, String>;

pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records `message` for `key` unless the field already has an error.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    /// `Ok(())` when no check failed, otherwise the collected errors.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[must_use]
pub fn permitted_value(value: &str, permitted: &[&str]) -> bool {
    permitted.contains(&value)
}

#[must_use]
pub fn unique<T: AsRef<str>>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_per_field_wins() {
        let mut v = Validator::new();
        v.check(false, "title", "must be provided");
        v.check(false, "title", "must not be more than 500 bytes long");
        v.check(true, "year", "must be provided");

        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["title"], "must be provided");
    }

    #[test]
    fn test_email_regex() {
        assert!(EMAIL_RX.is_match("alice@example.com"));
        assert!(EMAIL_RX.is_match("a.b+tag@sub.example.co"));
        assert!(!EMAIL_RX.is_match("alice@"));
        assert!(!EMAIL_RX.is_match("not an email"));
    }

    #[test]
    fn test_unique() {
        assert!(unique(&["drama", "war"]));
        assert!(!unique(&["drama", "drama"]));
        assert!(unique::<&str>(&[]));
    }
}
