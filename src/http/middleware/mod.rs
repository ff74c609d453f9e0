//! HTTP middleware.

pub mod request_log;

pub use request_log::{
    log_request, request_logging_middleware, HttpExchange, RequestContext, RequestErrors,
};
