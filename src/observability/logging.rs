//! Structured logger construction.
//!
//! # Responsibilities
//! - Turn a `LoggingConfiguration` into a ready `LoggerHandle`
//! - Resolve initial fields, rotation defaults and the level threshold
//! - Wire stdout and the rotated file behind one dispatcher
//!
//! # Design Decisions
//! - Output is always the JSON entry format; a configured `console`
//!   encoding only disables the initial fields and is reported
//! - The handle is built explicitly and installed once; nothing here
//!   touches global state until `install` is called
//! - Builder diagnostics are logged through the new logger, so they reach
//!   the rotated file as well

use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use crate::config::schema::{LoggingConfiguration, DEFAULT_ENCODING};
use crate::observability::format::EntryFormat;
use crate::observability::level::{parse_level, AtomicLevel, LevelLayer};
use crate::observability::rotation::{resolve_target, RotatingFile, RotationPolicy};

type Base = Layered<LevelLayer, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync + 'static>;

/// Error type for logger construction.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("can't use directory {} as log file name", .0.display())]
    DirectoryTarget(PathBuf),

    #[error("failed to open log file {}: {source}", .path.display())]
    RotationSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global logger is already installed")]
    AlreadyInstalled(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

/// A built logger.
///
/// Owns the dispatcher and the background writers. Entries are emitted with
/// the `tracing` macros while the handle is installed or in scope.
pub struct LoggerHandle {
    dispatch: Dispatch,
    level: AtomicLevel,
    file_path: Option<PathBuf>,
    guards: Vec<WorkerGuard>,
}

impl LoggerHandle {
    /// The dispatcher routing events to this logger.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Runtime-adjustable level threshold.
    pub fn level(&self) -> &AtomicLevel {
        &self.level
    }

    /// Active rotated file, if file output is configured.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Run `f` with this logger as the current thread's default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Make this logger the process-wide default. Can succeed only once.
    pub fn install(&self) -> Result<(), BuildError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())?;
        Ok(())
    }

    /// Flush buffered file entries and stop the background writer.
    ///
    /// Call once at shutdown; later file writes are discarded.
    pub fn sync(self) {
        let LoggerHandle { guards, .. } = self;
        drop(guards);
    }
}

impl std::fmt::Debug for LoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerHandle")
            .field("level", &self.level)
            .field("file_path", &self.file_path)
            .finish()
    }
}

/// Build a logger writing to stdout (and the rotated file, if configured).
pub fn build_logger(config: &LoggingConfiguration) -> Result<LoggerHandle, BuildError> {
    build_logger_with_writer(config, std::io::stdout)
}

/// Build a logger whose console output goes to `console` instead of stdout.
pub fn build_logger_with_writer<W>(
    config: &LoggingConfiguration,
    console: W,
) -> Result<LoggerHandle, BuildError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let mut diagnostics = Vec::new();

    let threshold =
        parse_level(&config.level).ok_or_else(|| BuildError::UnknownLevel(config.level.clone()))?;
    let (level, level_layer) = AtomicLevel::new(threshold);

    let initial_fields = resolve_initial_fields(config, &mut diagnostics);
    let format = EntryFormat::from_config(config, initial_fields);

    let mut layers: Vec<BoxedLayer> = vec![tracing_subscriber::fmt::layer()
        .event_format(format.clone())
        .with_writer(console)
        .boxed()];

    let mut guards = Vec::new();
    let mut file_path = None;

    if let Some(file_config) = &config.log_file {
        if Path::new(&file_config.file_name).is_dir() {
            return Err(BuildError::DirectoryTarget(PathBuf::from(&file_config.file_name)));
        }

        let path = resolve_target(file_config, &Local::now());
        let sink = RotatingFile::open(&path, RotationPolicy::from_config(file_config))
            .map_err(|source| BuildError::RotationSink {
                path: path.clone(),
                source,
            })?;
        let (writer, guard) = tracing_appender::non_blocking(sink);

        layers.push(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(writer)
                .boxed(),
        );
        guards.push(guard);
        file_path = Some(path);
    }

    if !config.uses_default_encoding() {
        diagnostics.push(format!(
            "encoding '{}' is not supported, writing {} entries",
            config.encoding, DEFAULT_ENCODING
        ));
    }

    let subscriber = Registry::default().with(level_layer).with(layers);
    let handle = LoggerHandle {
        dispatch: Dispatch::new(subscriber),
        level,
        file_path,
        guards,
    };

    handle.in_scope(|| {
        for message in &diagnostics {
            tracing::warn!("{}", message);
        }
        tracing::debug!(
            threshold = %threshold,
            file = ?handle.file_path(),
            "Logger initialized"
        );
    });

    Ok(handle)
}

/// Parse the `format` blob into fields attached to every entry.
///
/// Only used with the default encoding. A malformed blob is reported and
/// ignored.
fn resolve_initial_fields(
    config: &LoggingConfiguration,
    diagnostics: &mut Vec<String>,
) -> Map<String, Value> {
    if !config.uses_default_encoding() || config.format.is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Map<String, Value>>(&config.format) {
        Ok(fields) => fields,
        Err(e) => {
            diagnostics.push(format!("ignoring malformed format fields: {e}"));
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FileRotationConfig;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::filter::LevelFilter;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn entries(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn build(config: &LoggingConfiguration) -> (LoggerHandle, Buffer) {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let handle = build_logger_with_writer(config, move || writer.clone()).unwrap();
        (handle, buffer)
    }

    #[test]
    fn test_stdout_only_without_file() {
        let (handle, buffer) = build(&LoggingConfiguration::default());
        assert!(handle.file_path().is_none());

        handle.in_scope(|| tracing::info!("hello"));
        let entries = buffer.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["msg"], "hello");
    }

    #[test]
    fn test_format_blob_attached() {
        let config = LoggingConfiguration {
            format: r#"{"service":"x"}"#.into(),
            ..Default::default()
        };
        let (handle, buffer) = build(&config);

        handle.in_scope(|| {
            tracing::info!("one");
            tracing::warn!(attempt = 2, "two");
        });

        let entries = buffer.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e["service"] == "x"));
    }

    #[test]
    fn test_format_blob_ignored_for_console() {
        let config = LoggingConfiguration {
            encoding: "console".into(),
            format: r#"{"service":"x"}"#.into(),
            ..Default::default()
        };
        let (handle, buffer) = build(&config);
        handle.in_scope(|| tracing::info!("plain"));

        let entries = buffer.entries();
        // Encoding notice, then the entry itself, still JSON.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["level"], "warn");
        assert!(entries[1].get("service").is_none());
    }

    #[test]
    fn test_malformed_blob_reported() {
        let config = LoggingConfiguration {
            format: "not json".into(),
            ..Default::default()
        };
        let (handle, buffer) = build(&config);
        handle.in_scope(|| tracing::info!("after"));

        let entries = buffer.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0]["msg"].as_str().unwrap().contains("malformed"));
        assert_eq!(entries[1]["msg"], "after");
    }

    #[test]
    fn test_level_threshold_adjustable() {
        let config = LoggingConfiguration {
            level: "warn".into(),
            ..Default::default()
        };
        let (handle, buffer) = build(&config);

        handle.in_scope(|| tracing::info!("dropped"));
        assert!(buffer.entries().is_empty());

        handle.level().set_level(LevelFilter::DEBUG).unwrap();
        handle.in_scope(|| tracing::debug!("kept"));
        let entries = buffer.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["level"], "debug");
    }

    #[test]
    fn test_init_entry_keeps_its_own_level() {
        let config = LoggingConfiguration {
            level: "trace".into(),
            ..Default::default()
        };
        let (_handle, buffer) = build(&config);

        let entries = buffer.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["msg"], "Logger initialized");
        assert_eq!(entries[0]["level"], "debug");
        assert_eq!(entries[0]["threshold"], "trace");
    }

    #[test]
    fn test_unknown_level_fails() {
        let config = LoggingConfiguration {
            level: "verbose".into(),
            ..Default::default()
        };
        let err = build_logger_with_writer(&config, io::sink).unwrap_err();
        assert!(matches!(err, BuildError::UnknownLevel(_)));
    }

    #[test]
    fn test_rotated_file_receives_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfiguration {
            log_file: Some(FileRotationConfig {
                file_name: dir.path().join("app.log").to_string_lossy().into_owned(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (handle, buffer) = build(&config);

        let path = handle.file_path().unwrap().to_path_buf();
        assert_eq!(path.parent(), Some(dir.path()));
        assert_ne!(path.file_name().unwrap(), "app.log");

        handle.in_scope(|| tracing::info!("to both"));
        handle.sync();

        let written = std::fs::read_to_string(&path).unwrap();
        let entry: Value = serde_json::from_str(written.lines().next().unwrap()).unwrap();
        assert_eq!(entry["msg"], "to both");
        assert_eq!(buffer.entries().len(), 1);
    }

    #[test]
    fn test_directory_target_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfiguration {
            log_file: Some(FileRotationConfig {
                file_name: dir.path().to_string_lossy().into_owned(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = build_logger_with_writer(&config, io::sink).unwrap_err();
        assert!(matches!(err, BuildError::DirectoryTarget(_)));
    }
}
