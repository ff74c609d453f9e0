//! JSON entry encoder.
//!
//! Every event becomes one JSON object on its own line:
//!
//! ```text
//! {"caller":"src/http/server.rs:42","level":"info","logger":"logwire::http",
//!  "msg":"/health","service":"x","status":200,"time":"2026-10-19 10:11:12"}
//! ```
//!
//! Initial fields from the configuration are merged into every entry; event
//! fields with the same name win. The fixed keys (`time`, `level`, `logger`,
//! `caller`, `msg`, `stacktrace`) always hold the encoder's own values; an
//! event or initial field using one of those names is kept as `fields.<name>`.
//!
//! Durations are recorded with [`seconds`], which yields a float number of
//! seconds; other values are never reinterpreted.

use std::backtrace::Backtrace;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde_json::{Map, Number, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::config::schema::LoggingConfiguration;

pub const TIME_KEY: &str = "time";
pub const LEVEL_KEY: &str = "level";
pub const NAME_KEY: &str = "logger";
pub const CALLER_KEY: &str = "caller";
pub const MESSAGE_KEY: &str = "msg";
pub const STACKTRACE_KEY: &str = "stacktrace";

const RESERVED_KEYS: [&str; 6] = [TIME_KEY, LEVEL_KEY, NAME_KEY, CALLER_KEY, MESSAGE_KEY, STACKTRACE_KEY];

/// Prefix given to user fields whose name clashes with a fixed key.
pub const SHADOWED_PREFIX: &str = "fields.";

/// Timestamp layout: second precision, no offset.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a duration as a field value in seconds.
///
/// ```ignore
/// tracing::info!(elapsed = seconds(started.elapsed()), "flushed");
/// ```
pub fn seconds(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

/// Event formatter producing one JSON object per line.
#[derive(Debug, Clone)]
pub struct EntryFormat {
    initial_fields: Arc<Map<String, Value>>,
    with_time: bool,
    with_caller: bool,
    stacktrace_level: Option<Level>,
    error_verbose: bool,
}

impl Default for EntryFormat {
    fn default() -> Self {
        Self {
            initial_fields: Arc::new(Map::new()),
            with_time: true,
            with_caller: true,
            stacktrace_level: Some(Level::ERROR),
            error_verbose: true,
        }
    }
}

impl EntryFormat {
    /// Derive the encoder settings from the configuration flags.
    pub fn from_config(config: &LoggingConfiguration, initial_fields: Map<String, Value>) -> Self {
        let stacktrace_level = if config.disable_stacktrace {
            None
        } else if config.development {
            Some(Level::WARN)
        } else {
            Some(Level::ERROR)
        };

        Self {
            initial_fields: Arc::new(initial_fields),
            with_time: !config.disable_timestamp,
            with_caller: !config.disable_caller,
            stacktrace_level,
            error_verbose: !config.disable_error_verbose,
        }
    }

    /// Fields attached to every entry.
    pub fn initial_fields(&self) -> &Map<String, Value> {
        &self.initial_fields
    }

    fn wants_stacktrace(&self, level: &Level) -> bool {
        // More verbose levels compare greater.
        self.stacktrace_level.is_some_and(|threshold| *level <= threshold)
    }
}

impl<S, N> FormatEvent<S, N> for EntryFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let mut visitor = EntryVisitor::new(self.error_verbose);
        event.record(&mut visitor);

        let mut entry = Map::new();
        for (key, value) in self.initial_fields.iter() {
            insert_user_field(&mut entry, key.clone(), value.clone());
        }
        for (key, value) in visitor.fields {
            insert_user_field(&mut entry, key, value);
        }

        if self.with_time {
            entry.insert(TIME_KEY.into(), Value::String(Local::now().format(TIME_FORMAT).to_string()));
        }
        entry.insert(LEVEL_KEY.into(), Value::String(level_name(meta.level()).into()));
        entry.insert(NAME_KEY.into(), Value::String(meta.target().into()));
        if self.with_caller {
            if let Some(file) = meta.file() {
                let caller = match meta.line() {
                    Some(line) => format!("{file}:{line}"),
                    None => file.to_string(),
                };
                entry.insert(CALLER_KEY.into(), Value::String(caller));
            }
        }
        entry.insert(MESSAGE_KEY.into(), Value::String(visitor.message.unwrap_or_default()));

        if self.wants_stacktrace(meta.level()) {
            entry.insert(
                STACKTRACE_KEY.into(),
                Value::String(Backtrace::force_capture().to_string()),
            );
        }

        let line = serde_json::to_string(&Value::Object(entry)).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

fn insert_user_field(entry: &mut Map<String, Value>, key: String, value: Value) {
    if RESERVED_KEYS.contains(&key.as_str()) {
        entry.insert(format!("{SHADOWED_PREFIX}{key}"), value);
    } else {
        entry.insert(key, value);
    }
}

/// Lowercase level name.
pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Collects the message and typed fields of an event.
struct EntryVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
    error_verbose: bool,
}

impl EntryVisitor {
    fn new(error_verbose: bool) -> Self {
        Self {
            message: None,
            fields: Map::new(),
            error_verbose,
        }
    }

    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.message = Some(text);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.insert(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));

        if self.error_verbose && value.source().is_some() {
            let mut chain = value.to_string();
            let mut source = value.source();
            while let Some(err) = source {
                chain.push_str(": ");
                chain.push_str(&err.to_string());
                source = err.source();
            }
            self.fields.insert(format!("{}Verbose", field.name()), Value::String(chain));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}
