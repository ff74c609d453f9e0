//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! LoggingConfiguration
//!     → logging.rs (builder: level, initial fields, sinks)
//!         → level.rs (reloadable threshold)
//!         → format.rs (one JSON object per entry)
//!         → rotation.rs (size-rotated file behind a non-blocking writer)
//!     → LoggerHandle (installed once, synced at shutdown)
//! ```

pub mod format;
pub mod level;
pub mod logging;
pub mod rotation;

pub use level::AtomicLevel;
pub use logging::{build_logger, build_logger_with_writer, BuildError, LoggerHandle};
