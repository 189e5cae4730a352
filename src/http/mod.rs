//! HTTP transport seam with reset-class error classification.
//!
//! The request pipeline only talks to the network through [`Transport`], so
//! tests can script exact sequences of responses and connection failures.

mod client;
mod retry;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{self, LbError};

pub use client::HttpTransport;
pub use retry::{classify_error, is_reset_kind};

/// Header names whose values never reach the logs.
const SENSITIVE_HEADERS: &[&str] = &["x-auth-key", "x-auth-token", "x-storage-token"];

/// HTTP methods accepted by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for Method {
    type Err = LbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(LbError::Syntax(format!(
                "Unsupported HTTP method: {}. Expected GET, POST, PUT, or DELETE.",
                s
            ))),
        }
    }
}

/// A fully built request, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Header pairs with credential values masked, for logging.
    pub fn redacted_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(name, value)| {
                let shown = if value.is_sensitive() || SENSITIVE_HEADERS.contains(&name.as_str()) {
                    "[redacted]".to_string()
                } else {
                    value.to_str().unwrap_or("[binary]").to_string()
                };
                (name.as_str().to_string(), shown)
            })
            .collect()
    }
}

/// A response as read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Status 200 through 209.
    pub fn is_success(&self) -> bool {
        (200..=209).contains(&self.status)
    }

    /// Exactly 202, the success status for deletions.
    pub fn is_accepted(&self) -> bool {
        self.status == 202
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> error::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the response unchanged when successful, the matching fault otherwise.
    pub fn error_for_fault(self) -> error::Result<Self> {
        error::raise_exception(&self)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection reset, broken pipe, unexpected EOF: worth reconnecting.
    Reset,
    Other,
}

/// A connection-level failure, distinct from an HTTP error status.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn reset(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Reset, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    pub fn is_reset(&self) -> bool {
        self.kind == TransportErrorKind::Reset
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and reads the whole response body.
    async fn send(&self, request: &HttpRequest) -> Result<Response, TransportError>;

    /// Drops any open connection to `host` so the next send starts fresh.
    fn reconnect(&self, host: &str) -> Result<(), TransportError>;
}
