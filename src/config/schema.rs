//! Configuration schema definitions.
//!
//! This module defines the logging configuration structure.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Output encoding used when nothing else is configured.
pub const DEFAULT_ENCODING: &str = "json";

/// Rotation threshold in megabytes applied when `max_size` is zero.
pub const DEFAULT_MAX_SIZE_MB: u64 = 1024;

/// Logging configuration, read from the `log` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfiguration {
    /// Minimum level (trace, debug, info, warn, error, dpanic, panic, fatal).
    pub level: String,

    /// Requested encoding ("json" or "console"). Empty means unset.
    pub encoding: String,

    /// JSON object whose keys are attached to every entry.
    pub format: String,

    /// Omit the `time` key from entries.
    pub disable_timestamp: bool,

    /// Development mode: stack traces from warn level upwards.
    pub development: bool,

    /// Omit the `caller` key from entries.
    pub disable_caller: bool,

    /// Never attach `stacktrace`.
    pub disable_stacktrace: bool,

    /// Do not expand error sources into `<field>Verbose`.
    pub disable_error_verbose: bool,

    /// Optional rotated log file.
    pub log_file: Option<FileRotationConfig>,
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            encoding: String::new(),
            format: String::new(),
            disable_timestamp: false,
            development: false,
            disable_caller: false,
            disable_stacktrace: false,
            disable_error_verbose: false,
            log_file: None,
        }
    }
}

impl LoggingConfiguration {
    /// Whether the configured encoding is unset or the default JSON encoding.
    ///
    /// Only then is the `format` blob consulted for initial fields.
    pub fn uses_default_encoding(&self) -> bool {
        self.encoding.is_empty() || self.encoding == DEFAULT_ENCODING
    }
}

/// File rotation configuration, read from `log_file`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct FileRotationConfig {
    /// Configured file path. Only its directory survives the build step.
    pub file_name: String,

    /// Maximum file size in megabytes before rotating (0 = default).
    pub max_size: u64,

    /// Maximum age of rotated files in days (0 = keep forever).
    pub max_days: u32,

    /// Maximum number of rotated files to keep (0 = keep all).
    pub max_backups: u32,
}

impl FileRotationConfig {
    /// Size threshold in megabytes with the default applied.
    pub fn resolved_max_size(&self) -> u64 {
        if self.max_size == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            self.max_size
        }
    }
}
