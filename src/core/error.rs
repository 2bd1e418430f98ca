//! Error types for the breakwatch library.
//!
//! Every failure mode here is a construction-time condition: once a
//! breaker is running, probe failures are absorbed at the probe layer and
//! never surface as errors. The library never panics; all errors are
//! returned as `Result` values.

use thiserror::Error;

/// The main error type for breaker and probe construction.
///
/// All variants include enough context to identify the offending
/// configuration field or input, so callers can report actionable
/// messages without inspecting the raw input themselves.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The configuration is invalid for a reason not tied to a single field.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// A configuration field holds an out-of-range or malformed value.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// Path of the offending field, e.g. `probes[1].threshold`.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The untyped configuration input could not be decoded.
    #[error("invalid configuration input: {0}")]
    Parse(#[from] serde_json::Error),
}

impl BreakerError {
    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an `InvalidField` error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the offending field path, if this error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// A specialized `Result` type for breaker construction.
pub type BreakerResult<T> = Result<T, BreakerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_display() {
        let err = BreakerError::invalid_field("probes[0].threshold", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "invalid value for 'probes[0].threshold': must be greater than 0"
        );
        assert_eq!(err.field(), Some("probes[0].threshold"));
    }

    #[test]
    fn test_configuration_display() {
        let err = BreakerError::configuration("stabilize threshold must be at least 1");
        assert!(err.to_string().starts_with("configuration error:"));
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_parse_error_from_serde() {
        let err: BreakerError = serde_json::from_str::<serde_json::Value>("{")
            .map_err(BreakerError::from)
            .unwrap_err();
        assert!(matches!(err, BreakerError::Parse(_)));
    }
}
