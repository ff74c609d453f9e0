//! Configuration loading from disk.
//!
//! The logging settings live in three places of one document:
//! - `log`: the base fields (required)
//! - `log_file`: top-level rotation settings, overriding `log.log_file`
//! - `log_format`: any value, serialized back to JSON as the `format` blob
//!
//! Documents may be TOML, JSON or YAML; the extension picks the syntax.

use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat, FileStoredFormat};
use serde_json::Value;
use thiserror::Error;

use crate::config::schema::{FileRotationConfig, LoggingConfiguration};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the logger-specific search directory.
pub const CONFIG_DIR_ENV: &str = "LOGWIRE_CONFIG_DIR";

/// Logger-specific directory searched before the working directory.
pub const DEFAULT_CONFIG_DIR: &str = "libs/logger";

/// Config file name without extension.
pub const DEFAULT_CONFIG_NAME: &str = "config";

/// Document formats in lookup order.
const FORMATS: [FileFormat; 3] = [FileFormat::Toml, FileFormat::Json, FileFormat::Yaml];

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("validation failed: {}", display_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick the document format from a path's extension.
pub fn format_for_path(path: &Path) -> Option<FileFormat> {
    let ext = path.extension()?.to_str()?;
    FORMATS.into_iter().find(|format| {
        format
            .file_extensions()
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

/// Locates the config file and extracts the logging sections from it.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    name: String,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader searching the logger directory (or `LOGWIRE_CONFIG_DIR`) then `.`.
    pub fn new() -> Self {
        let logger_dir =
            std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());

        Self {
            name: DEFAULT_CONFIG_NAME.to_string(),
            search_paths: vec![PathBuf::from(logger_dir), PathBuf::from(".")],
            file: None,
        }
    }

    /// Replace the search paths. Earlier paths win.
    pub fn with_search_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Put a directory in front of the current search paths.
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.insert(0, path.into());
        self
    }

    /// Change the file name looked up in each search path (without extension).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use this exact file and skip the search.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Find the config file that would be loaded.
    ///
    /// The first search path holding `<name>.<ext>` for any supported
    /// extension wins; files in later paths are not merged in.
    pub fn locate(&self) -> Result<PathBuf, ConfigError> {
        if let Some(file) = &self.file {
            return if file.is_file() {
                Ok(file.clone())
            } else {
                Err(ConfigError::NotFound {
                    searched: vec![file.clone()],
                })
            };
        }

        let mut searched = Vec::new();
        for dir in &self.search_paths {
            for format in FORMATS {
                for ext in format.file_extensions() {
                    let candidate = dir.join(format!("{}.{}", self.name, ext));
                    if candidate.is_file() {
                        return Ok(candidate);
                    }
                    searched.push(candidate);
                }
            }
        }

        Err(ConfigError::NotFound { searched })
    }

    /// Locate, parse and validate the logging configuration.
    pub fn load(&self) -> Result<LoggingConfiguration, ConfigError> {
        let path = self.locate()?;
        tracing::debug!(path = %path.display(), "Loading logging configuration");
        load_config(&path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and validate the logging configuration from a file.
pub fn load_config(path: &Path) -> Result<LoggingConfiguration, ConfigError> {
    let parse_error = |reason: String| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let format = format_for_path(path)
        .ok_or_else(|| parse_error("unsupported config file extension".to_string()))?;

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&content, format).map_err(parse_error)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Extract the logging configuration from document text.
///
/// Returns a human readable reason on failure.
pub fn parse_config(content: &str, format: FileFormat) -> Result<LoggingConfiguration, String> {
    let document = Config::builder()
        .add_source(File::from_str(content, format))
        .build()
        .map_err(|e| e.to_string())?;

    let mut config: LoggingConfiguration = match document.get("log") {
        Ok(section) => section,
        Err(config::ConfigError::NotFound(_)) => return Err("missing [log] section".to_string()),
        Err(e) => return Err(format!("invalid [log] section: {e}")),
    };

    if let Some(file) = optional_section::<FileRotationConfig>(&document, "log_file")? {
        config.log_file = Some(file);
    }

    if let Some(value) = optional_section::<Value>(&document, "log_format")? {
        if !value.is_null() {
            config.format = serde_json::to_string(&value)
                .map_err(|e| format!("invalid [log_format] value: {e}"))?;
        }
    }

    Ok(config)
}

fn optional_section<T>(document: &Config, key: &str) -> Result<Option<T>, String>
where
    T: serde::de::DeserializeOwned,
{
    match document.get::<Option<T>>(key) {
        Ok(section) => Ok(section),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(format!("invalid [{key}] section: {e}")),
    }
}
