//! Error taxonomy for the load balancer client.
//!
//! Every failure surfaced by the library is an [`LbError`]. Server-reported
//! faults are carried by [`FaultError`] and built by [`raise_exception`] from a
//! non-success response.

mod fault;

use std::fmt;
use thiserror::Error;

pub use fault::raise_exception;

pub type Result<T, E = LbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LbError {
    /// A required argument was not supplied.
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// An argument was supplied but is malformed.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// The identity handshake failed or the region is not served.
    #[error("{message}")]
    Authentication { message: String, status: Option<u16> },

    /// Transport retries exhausted, re-authentication declined, or timeout.
    #[error("{0}")]
    Connection(String),

    #[error(transparent)]
    Fault(#[from] FaultError),

    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),
}

impl LbError {
    pub fn authentication(message: impl Into<String>) -> Self {
        LbError::Authentication {
            message: message.into(),
            status: None,
        }
    }

    pub(crate) fn authentication_status(status: u16) -> Self {
        LbError::Authentication {
            message: format!("Authentication failed with response code {}", status),
            status: Some(status),
        }
    }

    /// Returns the fault kind when this error was reported by the server.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            LbError::Fault(fault) => Some(fault.kind),
            _ => None,
        }
    }

    /// HTTP status observed for this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LbError::Fault(fault) => Some(fault.status),
            LbError::Authentication { status, .. } => *status,
            _ => None,
        }
    }
}

/// A fault returned by the management API, with the raw response for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FaultError {
    pub kind: FaultKind,
    pub message: String,
    pub status: u16,
    pub body: String,
}

impl FaultError {
    pub(crate) fn other(status: u16, body: String) -> Self {
        Self {
            kind: FaultKind::Other,
            message: format!("The server returned status {} with body {}", status, body),
            status,
            body,
        }
    }
}

/// Closed set of fault categories the management API reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    ServiceFault,
    LoadBalancerFault,
    ServiceUnavailable,
    Unauthorized,
    BadRequest,
    ItemNotFound,
    OverLimit,
    OutOfVirtualIps,
    ImmutableEntity,
    UnprocessableEntity,
    /// Unparseable body or a fault kind outside the table.
    Other,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::ServiceFault => "ServiceFault",
            FaultKind::LoadBalancerFault => "LoadBalancerFault",
            FaultKind::ServiceUnavailable => "ServiceUnavailable",
            FaultKind::Unauthorized => "Unauthorized",
            FaultKind::BadRequest => "BadRequest",
            FaultKind::ItemNotFound => "ItemNotFound",
            FaultKind::OverLimit => "OverLimit",
            FaultKind::OutOfVirtualIps => "OutOfVirtualIps",
            FaultKind::ImmutableEntity => "ImmutableEntity",
            FaultKind::UnprocessableEntity => "UnprocessableEntity",
            FaultKind::Other => "Other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
