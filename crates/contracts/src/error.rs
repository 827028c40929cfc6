//! Layered error definitions
//!
//! Categorized by source: config / decode / clock / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Wire Errors =====
    /// Datagram could not be decoded into a detection frame
    #[error("decode error: {message}")]
    Decode { message: String },

    // ===== Clock Errors =====
    /// Clock probe against a reference host failed
    #[error("clock probe against '{host}' failed: {message}")]
    ClockProbe { host: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create clock probe error
    pub fn clock_probe(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClockProbe {
            host: host.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ContractError::config_validation("tracking.max_ball_velocity", "must be > 0");
        assert_eq!(
            err.to_string(),
            "config validation error at 'tracking.max_ball_velocity': must be > 0"
        );
    }

    #[test]
    fn test_clock_probe_error_display() {
        let err = ContractError::clock_probe("10.0.0.2", "timed out");
        assert!(err.to_string().contains("10.0.0.2"));
        assert!(err.to_string().contains("timed out"));
    }
}
