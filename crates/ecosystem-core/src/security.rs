use std::env;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Read a credential from the environment. Unset or blank values yield `None`,
/// which callers treat as "capability not configured" rather than an error.
pub fn optional_env(var: &str) -> Option<SecretValue> {
    if var.trim().is_empty() {
        return None;
    }
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretValue(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretValue::new("sk-live-value");
        assert_eq!(format!("{secret:?}"), "***redacted***");
        assert_eq!(secret.expose(), "sk-live-value");
    }

    #[test]
    fn missing_variable_is_unconfigured() {
        assert!(optional_env("ECOSYSTEM_TEST_SECRET_THAT_IS_NEVER_SET").is_none());
    }

    #[test]
    fn blank_variable_name_is_unconfigured() {
        assert!(optional_env("  ").is_none());
    }
}
