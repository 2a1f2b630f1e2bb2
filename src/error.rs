//! Error types for the policy decision engine.
//!
//! The taxonomy follows the enforcement model: configuration errors are
//! rejected at rule-write time and never reach evaluation; evaluation errors
//! are resolved by the enforcement mode of the rule set being evaluated;
//! dispatch errors are retried and dead-lettered without ever touching the
//! enforcement decision already returned to the caller.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the policy decision engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Error during rule or rule-set validation (invalid regex, unsupported
    /// operator for an attribute type, malformed value). Raised at write
    /// time only.
    #[error("Rule validation error: {message}")]
    Validation {
        /// Detailed error message
        message: String,
        /// Field that caused the error, if applicable
        field: Option<String>,
    },

    /// Error during rule evaluation (missing attribute, type mismatch).
    /// Resolved by the enforcement mode: strict fails closed, permissive
    /// allows with an alert.
    #[error("Evaluation error: {message}")]
    Evaluation {
        /// Detailed error message
        message: String,
        /// Rule ID that caused the error, if applicable
        rule_id: Option<String>,
    },

    /// The runtime type of a context attribute disagrees with the condition's
    /// declared value type. A configuration problem surfaced at evaluation,
    /// never silently coerced.
    #[error("Type mismatch for attribute '{attribute}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// The attribute path that was evaluated
        attribute: String,
        /// The declared value type
        expected: String,
        /// The runtime type found in the context
        actual: String,
    },

    /// Alert delivery error. Retried with backoff; recorded to the
    /// dead-letter list after exhaustion.
    #[error("Dispatch error on channel '{channel}': {message}")]
    Dispatch {
        /// The channel that failed
        channel: String,
        /// Detailed error message
        message: String,
    },

    /// Canary registry error. A duplicate content hash would corrupt
    /// forensic attribution and is treated as fatal.
    #[error("Canary error: {message}")]
    Canary {
        /// Detailed error message
        message: String,
        /// Canary ID involved, if known
        canary_id: Option<String>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Detailed error message
        message: String,
        /// Configuration key that caused the error
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal error (unexpected condition)
    #[error("Internal error: {message}")]
    Internal {
        /// Detailed error message
        message: String,
    },
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field context.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Error::Evaluation {
            message: message.into(),
            rule_id: None,
        }
    }

    /// Create an evaluation error with rule context.
    pub fn evaluation_with_rule(message: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Error::Evaluation {
            message: message.into(),
            rule_id: Some(rule_id.into()),
        }
    }

    /// Create a type-mismatch error.
    pub fn type_mismatch(
        attribute: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch {
            attribute: attribute.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a dispatch error.
    pub fn dispatch(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Dispatch {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create a canary error.
    pub fn canary(message: impl Into<String>) -> Self {
        Error::Canary {
            message: message.into(),
            canary_id: None,
        }
    }

    /// Create a canary error with ID context.
    pub fn canary_with_id(message: impl Into<String>, canary_id: impl Into<String>) -> Self {
        Error::Canary {
            message: message.into(),
            canary_id: Some(canary_id.into()),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Dispatch { .. } | Error::Io(_))
    }

    /// Get the error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::Evaluation { .. } => "evaluation",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::Dispatch { .. } => "dispatch",
            Error::Canary { .. } => "canary",
            Error::Config { .. } => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Yaml(_) => "yaml",
            Error::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::validation("test error");
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::dispatch("siem", "unreachable").is_recoverable());
        assert!(!Error::validation("bad regex").is_recoverable());
        assert!(!Error::canary("duplicate hash").is_recoverable());
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = Error::type_mismatch("subject.clearance", "number", "string");
        let msg = err.to_string();
        assert!(msg.contains("subject.clearance"));
        assert!(msg.contains("number"));
    }
}
