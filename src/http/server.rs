//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with the demo handlers
//! - Wire up middleware (request logging, timeout)
//! - Bind server to listener and shut down gracefully

use axum::{
    extract::Path,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::http::middleware::{request_logging_middleware, RequestErrors};

/// Default request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Demo HTTP server with request logging installed.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the default request timeout.
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Create a new HTTP server with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            router: Self::build_router(timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The timeout sits inside the request logger, so a timed-out request
    /// is still logged with its 408.
    #[allow(deprecated)]
    pub fn build_router(timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/fail/{reason}", get(fail_handler))
            .route("/slow/{millis}", get(slow_handler))
            .layer(TimeoutLayer::new(timeout))
            .layer(middleware::from_fn(request_logging_middleware))
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Fails on purpose, attaching the reason for the request logger.
async fn fail_handler(Path(reason): Path<String>) -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Extension(RequestErrors::single(&reason)),
        reason,
    )
}

/// Answers after sleeping for the requested number of milliseconds.
async fn slow_handler(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "ok"
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_route() {
        let response = HttpServer::build_router(REQUEST_TIMEOUT)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fail_route_keeps_errors() {
        let response = HttpServer::build_router(REQUEST_TIMEOUT)
            .oneshot(Request::get("/fail/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let errors = response.extensions().get::<RequestErrors>().unwrap();
        assert_eq!(errors.as_slice(), ["boom"]);
    }

    #[tokio::test]
    async fn test_slow_route_times_out() {
        let response = HttpServer::build_router(Duration::from_millis(20))
            .oneshot(Request::get("/slow/200").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
