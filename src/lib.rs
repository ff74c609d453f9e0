//! Structured logging with file rotation and per-request HTTP logging.

pub mod config;
pub mod http;
pub mod observability;

pub use self::config::{ConfigLoader, LoggingConfiguration};
pub use http::{request_logging_middleware, HttpServer, RequestContext, RequestErrors};
pub use observability::{build_logger, AtomicLevel, LoggerHandle};
