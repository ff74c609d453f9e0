//! HTTP integration.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, timeout)
//!     → middleware/request_log.rs (runs handler, then logs one entry)
//!     → handler
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{request_logging_middleware, RequestContext, RequestErrors};
pub use server::HttpServer;
