use serde::Serialize;

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// Capability codes granted to a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    #[must_use]
    pub fn includes(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }
}

impl From<Vec<String>> for Permissions {
    fn from(codes: Vec<String>) -> Self {
        Self(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes() {
        let perms = Permissions::from(vec![MOVIES_READ.to_string()]);
        assert!(perms.includes(MOVIES_READ));
        assert!(!perms.includes(MOVIES_WRITE));
        assert!(!Permissions::default().includes(MOVIES_READ));
    }
}
