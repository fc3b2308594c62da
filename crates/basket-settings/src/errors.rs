//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A layer could not be read or did not match the settings shape.
    #[error("failed to load settings: {0}")]
    Extract(Box<figment::Error>),
    /// A settings value was invalid (e.g., empty or malformed).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("identity.projectId is empty".to_string());
        assert_eq!(
            err.to_string(),
            "invalid settings value: identity.projectId is empty"
        );
    }

    #[test]
    fn figment_error_conversion() {
        let err: SettingsError = figment::Error::from("bad layer".to_string()).into();
        assert!(matches!(err, SettingsError::Extract(_)));
        assert!(err.to_string().contains("bad layer"));
    }
}
