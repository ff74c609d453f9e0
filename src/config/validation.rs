//! Configuration validation.
//!
//! Serde handles the syntactic checks; this module checks values.
//! All errors are collected, not just the first one.

use thiserror::Error;

use crate::config::schema::LoggingConfiguration;
use crate::observability::level::parse_level;

/// Encodings accepted in the `encoding` field.
const KNOWN_ENCODINGS: &[&str] = &["json", "console"];

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("unknown encoding '{0}' (expected json or console)")]
    UnknownEncoding(String),

    #[error("format is not a JSON object: {0}")]
    MalformedFormat(String),
}

/// Validate a loaded configuration.
pub fn validate_config(config: &LoggingConfiguration) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if parse_level(&config.level).is_none() {
        errors.push(ValidationError::UnknownLevel(config.level.clone()));
    }

    if !config.encoding.is_empty() && !KNOWN_ENCODINGS.contains(&config.encoding.as_str()) {
        errors.push(ValidationError::UnknownEncoding(config.encoding.clone()));
    }

    if !config.format.is_empty() {
        if let Err(e) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&config.format) {
            errors.push(ValidationError::MalformedFormat(e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
