//! Error types for the transfer client.
//!
//! # Design
//! Two families of failure exist. Configuration errors are raised at the call
//! site that caused them (unknown option names, an engine that cannot run on
//! this host, a transfer with no endpoint). Transfer errors come from the
//! engine after the request was attempted and carry its numeric code and
//! message; they are returned from `execute` and also kept on the client so
//! they can be inspected after the fact.

use thiserror::Error;

/// Top-level error returned by `CurlClient` operations.
#[derive(Debug, Error)]
pub enum CurlError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl CurlError {
    /// The engine error, if this failure happened during the transfer itself.
    pub fn as_transfer(&self) -> Option<&TransferError> {
        match self {
            CurlError::Transfer(err) => Some(err),
            CurlError::Configuration(_) => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, CurlError::Configuration(_))
    }
}

/// Misconfiguration detected before any network I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The transfer engine cannot be used on this host.
    #[error("transfer engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A symbolic option name or numeric code that maps to no known option.
    #[error("unknown transfer option `{0}`")]
    UnknownOption(String),

    #[error("unknown authentication type `{0}`")]
    UnknownAuthType(String),

    /// The value cannot be used for the option it was given to.
    #[error("invalid value for {option}: expected {expected}")]
    InvalidValue {
        option: &'static str,
        expected: &'static str,
    },

    /// `execute` was called before `create`.
    #[error("no endpoint set; call create() before executing")]
    MissingEndpoint,

    #[error("invalid value `{value}` for environment variable {name}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Failure reported by the transfer engine (DNS, TLS, timeout, HTTP error
/// status with fail-on-error enabled, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transfer failed ({code}): {message}")]
pub struct TransferError {
    pub code: u32,
    pub message: String,
}

impl TransferError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_error_display_includes_code_and_message() {
        let err = CurlError::from(TransferError::new(22, "The requested URL returned error: 500"));
        assert_eq!(
            err.to_string(),
            "transfer failed (22): The requested URL returned error: 500"
        );
        assert_eq!(err.as_transfer().map(|e| e.code), Some(22));
        assert!(!err.is_configuration());
    }

    #[test]
    fn configuration_error_is_transparent() {
        let err = CurlError::from(ConfigurationError::UnknownOption("bogus".to_string()));
        assert_eq!(err.to_string(), "unknown transfer option `bogus`");
        assert!(err.is_configuration());
        assert!(err.as_transfer().is_none());
    }
}
