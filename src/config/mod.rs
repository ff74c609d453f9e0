//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON/YAML)
//!     → loader.rs (locate, parse, extract log / log_file / log_format)
//!     → validation.rs (semantic checks)
//!     → LoggingConfiguration (validated, immutable)
//!     → observability::logging builds the logger from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → new level applied through AtomicLevel
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the level is hot-reloadable; everything else needs a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{FileRotationConfig, LoggingConfiguration};
