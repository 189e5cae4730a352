//! Client for the Cloud Load Balancers management API.
//!
//! [`Client`] authenticates against the identity service, keeps the resulting
//! [`Session`] fresh and executes requests against the regional management
//! endpoint. Non-success responses become typed errors through
//! [`raise_exception`].

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod listing;
pub mod path;

pub use auth::{Credentials, Endpoint, EndpointTemplates, Region, Session, authenticate};
pub use client::{ApiRequest, Client, MAX_TRANSPORT_RETRIES};
pub use config::{AUTH_UK, AUTH_USA, AuthRegion, ClientConfig};
pub use error::{FaultError, FaultKind, LbError, Result, raise_exception};
pub use http::{HttpTransport, Method, Response, Transport};
pub use listing::{Algorithm, LoadBalancer, Protocol};

/// Crate version, taken from the release tag when built from git.
pub const VERSION: &str = env!("CLOUDLB_VERSION");

pub(crate) fn user_agent() -> String {
    format!("Cloud Load Balancers Rust API {}", VERSION)
}

/// Shared fixtures for tests that script the identity handshake.
#[cfg(test)]
pub mod test_utils {
    use crate::config::ClientConfig;
    use crate::http::{MockTransport, Response};

    pub const AUTH_URL: &str = "https://auth.example.com/v1.0";

    /// Management URL the identity service reports; the account id is all that is kept.
    pub const REPORTED_MANAGEMENT_URL: &str = "https://servers.example.com/v1.0/12345";

    /// A `dfw` config pointed at [`AUTH_URL`] with the default endpoint templates.
    pub fn test_config() -> ClientConfig {
        ClientConfig::new("user", "key", "dfw")
            .auth_url(AUTH_URL)
            .verbose(false)
    }

    /// A successful 204 handshake issuing `token`.
    pub fn auth_ok(token: &str) -> Response {
        Response::new(204)
            .with_header("x-auth-token", token)
            .with_header("x-server-management-url", REPORTED_MANAGEMENT_URL)
    }

    /// Expect exactly `times` handshakes, each issuing `token-1`.
    pub fn configure_auth(transport: &mut MockTransport, times: usize) {
        transport
            .expect_send()
            .withf(|req| req.url == AUTH_URL)
            .times(times)
            .returning(|_| Ok(auth_ok("token-1")));
    }
}
