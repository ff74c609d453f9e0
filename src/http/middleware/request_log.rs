//! Request logging middleware.
//! Records one entry per request once the handler has produced a response.

use std::fmt;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

/// What the request logger needs to know about a finished request.
pub trait RequestContext {
    /// Errors accumulated while handling the request.
    fn errors(&self) -> &[String];
    /// URL path, without query.
    fn path(&self) -> &str;
    /// Response status code.
    fn status(&self) -> u16;
    /// HTTP method.
    fn method(&self) -> &str;
    /// Originating client address.
    fn client_ip(&self) -> &str;
    /// `User-Agent` header, empty when absent.
    fn user_agent(&self) -> &str;
}

/// Errors a handler attaches to its response for the request logger.
///
/// Return it as `Extension(errors)` alongside the response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestErrors(Vec<String>);

impl RequestErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors holding a single message.
    pub fn single(error: impl fmt::Display) -> Self {
        Self(vec![error.to_string()])
    }

    pub fn push(&mut self, error: impl fmt::Display) {
        self.0.push(error.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Emit the entries for one finished request.
///
/// Each accumulated error becomes an error entry with no fields; a clean
/// request becomes one info entry keyed by its path.
pub fn log_request<C: RequestContext + ?Sized>(ctx: &C) {
    let errors = ctx.errors();
    if !errors.is_empty() {
        for error in errors {
            tracing::error!("{}", error);
        }
        return;
    }

    tracing::info!(
        status = ctx.status(),
        method = ctx.method(),
        path = ctx.path(),
        ip = ctx.client_ip(),
        "user-agent" = ctx.user_agent(),
        "{}",
        ctx.path()
    );
}

/// A finished axum request/response pair.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub errors: Vec<String>,
    pub path: String,
    pub status: u16,
    pub method: String,
    pub client_ip: String,
    pub user_agent: String,
}

impl RequestContext for HttpExchange {
    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn client_ip(&self) -> &str {
        &self.client_ip
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Resolve the client address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

/// Middleware function logging every request after the handler completes.
///
/// Never short-circuits: the downstream response is returned unchanged.
pub async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = client_ip(request.headers(), peer);

    let response = next.run(request).await;

    let exchange = HttpExchange {
        errors: response
            .extensions()
            .get::<RequestErrors>()
            .map(|e| e.as_slice().to_vec())
            .unwrap_or_default(),
        path,
        status: response.status().as_u16(),
        method,
        client_ip,
        user_agent,
    };
    log_request(&exchange);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "");

        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.4"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.0.2.4");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.1.1.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_request_errors() {
        let mut errors = RequestErrors::new();
        assert!(errors.is_empty());
        errors.push("first");
        errors.push(format_args!("second {}", 2));
        assert_eq!(errors.as_slice(), ["first", "second 2"]);
        assert_eq!(RequestErrors::single("x").as_slice(), ["x"]);
    }
}
