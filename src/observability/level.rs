//! Runtime-adjustable level threshold.
//!
//! The threshold is a `LevelFilter` behind a reload layer installed at the
//! bottom of the subscriber stack. Changing it rebuilds the callsite
//! interest cache so disabled callsites become enabled immediately.

use std::fmt;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{reload, Registry};

/// Reload layer owning the current threshold.
pub type LevelLayer = reload::Layer<LevelFilter, Registry>;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("unknown log level '{0}'")]
    Unknown(String),

    #[error("logger was dropped")]
    Detached(#[from] reload::Error),
}

/// Parse a configured level name.
///
/// An empty name means info. `dpanic`, `panic` and `fatal` collapse to error.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "info" => Some(LevelFilter::INFO),
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" | "dpanic" | "panic" | "fatal" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Shared handle to the logger's level threshold.
#[derive(Clone)]
pub struct AtomicLevel {
    handle: reload::Handle<LevelFilter, Registry>,
}

impl AtomicLevel {
    /// Create a level handle and the layer it controls.
    ///
    /// The layer must be added to the subscriber; once the subscriber is
    /// dropped the handle is detached and updates fail.
    pub fn new(initial: LevelFilter) -> (Self, LevelLayer) {
        let (layer, handle) = reload::Layer::new(initial);
        (Self { handle }, layer)
    }

    /// Current threshold. A detached handle reports `OFF`.
    pub fn level(&self) -> LevelFilter {
        self.handle.clone_current().unwrap_or(LevelFilter::OFF)
    }

    /// Whether entries at `level` currently pass the threshold.
    pub fn enabled(&self, level: tracing::Level) -> bool {
        self.level() >= level
    }

    /// Replace the threshold, returning the previous one.
    pub fn set_level(&self, level: LevelFilter) -> Result<LevelFilter, LevelError> {
        let mut previous = LevelFilter::OFF;
        self.handle.modify(|current| {
            previous = *current;
            *current = level;
        })?;
        Ok(previous)
    }

    /// Parse and apply a level name.
    pub fn set_level_str(&self, name: &str) -> Result<LevelFilter, LevelError> {
        let level = parse_level(name).ok_or_else(|| LevelError::Unknown(name.to_string()))?;
        self.set_level(level)
    }
}

impl fmt::Debug for AtomicLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicLevel")
            .field("level", &self.level())
            .finish()
    }
}
