use log::{debug, info};
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::SystemTime;

use super::{Credentials, EndpointTemplates, Region};
use crate::error::{LbError, Result};
use crate::http::{HttpRequest, Method, Transport};

/// API version every management path is pinned to.
pub const API_VERSION: &str = "v1.0";

const AUTH_TOKEN_HEADER: &str = "x-auth-token";
const MANAGEMENT_URL_HEADER: &str = "x-server-management-url";

/// Where management requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    /// Versioned account prefix, e.g. `/v1.0/12345`.
    pub path_prefix: String,
}

impl Endpoint {
    /// Parses a management URL, pinning its first path segment to [`API_VERSION`].
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| {
            LbError::authentication(format!("Invalid management URL {}: {}", url, e))
        })?;

        let host = parsed
            .host_str()
            .ok_or_else(|| LbError::authentication(format!("Management URL {} has no host", url)))?
            .to_string();
        let port = parsed.port_or_known_default().ok_or_else(|| {
            LbError::authentication(format!("Management URL {} has no port", url))
        })?;

        Ok(Self {
            host,
            port,
            scheme: parsed.scheme().to_string(),
            path_prefix: versioned_prefix(parsed.path().trim_end()),
        })
    }

    /// Absolute URL for `path`, omitting the port when it is the scheme default.
    pub fn url(&self, path: &str) -> String {
        format_url(&self.scheme, &self.host, self.port, path)
    }
}

pub(crate) fn format_url(scheme: &str, host: &str, port: u16, path: &str) -> String {
    let default_port = match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if default_port == Some(port) {
        format!("{}://{}{}", scheme, host, path)
    } else {
        format!("{}://{}:{}{}", scheme, host, port, path)
    }
}

/// Replaces the first path segment with [`API_VERSION`]: `/2/123` becomes `/v1.0/123`.
fn versioned_prefix(path: &str) -> String {
    let Some(rest) = path.strip_prefix('/') else {
        return path.to_string();
    };
    match rest.split_once('/') {
        Some((_, tail)) => format!("/{}/{}", API_VERSION, tail),
        None => path.to_string(),
    }
}

/// Trailing digits of the management URL reported by the identity service.
///
/// Kept verbatim: leading zeros are significant.
fn account_id(management_url: &str) -> Option<&str> {
    let tail = management_url.rsplit('/').next()?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(tail)
}

/// An authenticated context. Never mutated: re-authenticating yields a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub account_id: String,
    pub endpoint: Endpoint,
    pub created_at: SystemTime,
}

/// Performs the identity handshake and derives the regional management endpoint.
///
/// The region is resolved before anything is sent, so an unserved region fails
/// with [`LbError::Authentication`] without touching the network.
#[tracing::instrument(skip(transport, credentials, endpoints), fields(user = %credentials.username()))]
pub async fn authenticate<T: Transport + ?Sized>(
    transport: &T,
    credentials: &Credentials,
    endpoints: &EndpointTemplates,
) -> Result<Session> {
    let region: Region = credentials.region().parse()?;

    let mut headers = HeaderMap::new();
    headers.insert("x-auth-user", header_value(credentials.username(), "username")?);
    let mut key = header_value(credentials.api_key(), "API key")?;
    key.set_sensitive(true);
    headers.insert("x-auth-key", key);
    headers.insert(USER_AGENT, header_value(&crate::user_agent(), "user agent")?);

    let request = HttpRequest {
        method: Method::Get,
        url: credentials.auth_url().to_string(),
        headers,
        body: None,
    };

    debug!("Authenticating against {}...", request.url);

    let response = transport.send(&request).await.map_err(|e| {
        LbError::Connection(format!(
            "Unable to reach authentication service at {}: {}",
            request.url, e
        ))
    })?;

    if response.status != 204 {
        return Err(LbError::authentication_status(response.status));
    }

    let token = response
        .header(AUTH_TOKEN_HEADER)
        .ok_or_else(|| LbError::authentication("Authentication response carried no x-auth-token"))?
        .to_string();

    let reported_url = response.header(MANAGEMENT_URL_HEADER).ok_or_else(|| {
        LbError::authentication("Authentication response carried no x-server-management-url")
    })?;
    let account_id = account_id(reported_url)
        .ok_or_else(|| {
            LbError::authentication(format!(
                "No account id at the end of management URL {}",
                reported_url
            ))
        })?
        .to_string();

    let endpoint = Endpoint::from_url(&endpoints.management_url(region, &account_id))?;

    info!(
        "Authenticated account {} in {} ({})",
        account_id,
        region,
        endpoint.url(&endpoint.path_prefix)
    );

    Ok(Session {
        token,
        account_id,
        endpoint,
        created_at: SystemTime::now(),
    })
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| LbError::Syntax(format!("The {} contains characters not allowed in a header", what)))
}
