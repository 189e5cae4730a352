//! Authenticated request execution with bounded retries.
//!
//! [`Client::execute`] is the only path to the management API. It keeps the
//! shared [`Session`] current, retries dropped connections a bounded number of
//! times, and re-authenticates once when the service rejects the token.

use log::{debug, info, warn};
use reqwest::header::{
    ACCEPT, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::session::format_url;
use crate::auth::{Credentials, Endpoint, EndpointTemplates, Session, authenticate};
use crate::config::ClientConfig;
use crate::error::{LbError, Result};
use crate::http::{HttpRequest, HttpTransport, Method, Response, Transport};

/// Consecutive dropped connections tolerated by one call before giving up.
pub const MAX_TRANSPORT_RETRIES: u32 = 5;

/// One logical call against the management API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub host: String,
    pub path: String,
    pub port: u16,
    pub scheme: String,
    /// Merged over the defaults; these win on conflict.
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub max_transport_retries: u32,
    /// Overrides the client-wide timeout for this call.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(
        method: Method,
        host: impl Into<String>,
        path: impl Into<String>,
        port: u16,
        scheme: impl Into<String>,
    ) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            port,
            scheme: scheme.into(),
            headers: HeaderMap::new(),
            body: None,
            max_transport_retries: MAX_TRANSPORT_RETRIES,
            timeout: None,
        }
    }

    /// A request for `path` under the endpoint's account prefix.
    pub fn to_endpoint(method: Method, endpoint: &Endpoint, path: &str) -> Self {
        Self::new(
            method,
            endpoint.host.as_str(),
            format!("{}{}", endpoint.path_prefix, path),
            endpoint.port,
            endpoint.scheme.as_str(),
        )
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self> {
        Ok(self.body(serde_json::to_vec(body)?))
    }

    pub fn max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> String {
        format_url(&self.scheme, &self.host, self.port, &self.path)
    }
}

/// Result of sending with a given session, before re-authentication is considered.
enum SendOutcome {
    Completed(Response),
    /// 401: the token was rejected.
    ExpiredAuthToken(Response),
}

/// Shared, thread-safe client for the management API.
pub struct Client<T: Transport = HttpTransport> {
    credentials: Credentials,
    endpoints: EndpointTemplates,
    retry_auth: bool,
    verbose: bool,
    timeout: Option<Duration>,
    transport: T,
    session: RwLock<Arc<Session>>,
    reauth: Mutex<()>,
}

impl Client<HttpTransport> {
    /// Builds a reqwest transport and authenticates.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new().map_err(|e| {
            LbError::Connection(format!("Failed to initialise HTTP client: {}", e))
        })?;
        Self::with_transport(config, transport).await
    }
}

impl<T: Transport> Client<T> {
    /// Authenticates over `transport`; fails if the first handshake fails.
    ///
    /// The handshake is bounded by the configured timeout.
    #[tracing::instrument(skip(config, transport))]
    pub async fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let credentials = config.credentials()?;
        let session = bounded(
            config.timeout,
            credentials.auth_url(),
            authenticate(&transport, &credentials, &config.endpoints),
        )
        .await?;

        Ok(Self {
            credentials,
            endpoints: config.endpoints,
            retry_auth: config.retry_auth,
            verbose: config.verbose,
            timeout: config.timeout,
            transport,
            session: RwLock::new(Arc::new(session)),
            reauth: Mutex::new(()),
        })
    }

    /// The session requests are currently signed with.
    pub fn session(&self) -> Arc<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// A request for `path` under the current session's account prefix.
    pub fn request(&self, method: Method, path: &str) -> ApiRequest {
        ApiRequest::to_endpoint(method, &self.session().endpoint, path)
    }

    /// Replaces the session unconditionally.
    pub async fn reauthenticate(&self) -> Result<Arc<Session>> {
        let _guard = self.reauth.lock().await;
        self.replace_session().await
    }

    /// Sends `request`, retrying dropped connections and re-authenticating once
    /// on an expired token.
    ///
    /// Every response other than the token-expiry 401 is returned as-is,
    /// including error statuses; pass it to [`crate::raise_exception`] to turn
    /// faults into errors.
    #[tracing::instrument(skip(self, request), fields(method = %request.method, host = %request.host, path = %request.path))]
    pub async fn execute(&self, request: ApiRequest) -> Result<Response> {
        bounded(
            request.timeout.or(self.timeout),
            &request.host,
            self.execute_inner(&request),
        )
        .await
    }

    async fn execute_inner(&self, request: &ApiRequest) -> Result<Response> {
        let mut attempts = 0;
        let session = self.session();

        let expired = match self.send_with_retry(request, &session, &mut attempts).await? {
            SendOutcome::Completed(response) => return Ok(response),
            SendOutcome::ExpiredAuthToken(response) => response,
        };

        if !self.retry_auth {
            debug!("Token rejected with status {}", expired.status);
            return Err(LbError::Connection(
                "Authentication token expired and you have requested not to retry".to_string(),
            ));
        }

        let fresh = self.refresh_session(&session).await?;
        match self.send_with_retry(request, &fresh, &mut attempts).await? {
            SendOutcome::Completed(response) => Ok(response),
            SendOutcome::ExpiredAuthToken(response) => {
                warn!(
                    "Token rejected again after re-authentication for {} {}",
                    request.method, request.path
                );
                Ok(response)
            }
        }
    }

    /// Sends until a response arrives or the reset budget is spent. `attempts`
    /// spans the whole logical call.
    async fn send_with_retry(
        &self,
        request: &ApiRequest,
        session: &Session,
        attempts: &mut u32,
    ) -> Result<SendOutcome> {
        let http_request = self.build_request(request, session)?;

        loop {
            self.log_request(&http_request);

            match self.transport.send(&http_request).await {
                Ok(response) => {
                    self.log_response(&response);
                    if response.status == 401 {
                        return Ok(SendOutcome::ExpiredAuthToken(response));
                    }
                    return Ok(SendOutcome::Completed(response));
                }
                Err(e) if e.is_reset() => {
                    if *attempts >= request.max_transport_retries {
                        return Err(LbError::Connection(format!(
                            "Unable to reconnect to {} after {} attempts",
                            request.host, attempts
                        )));
                    }
                    *attempts += 1;
                    warn!(
                        "Connection to {} dropped ({}), reconnecting (attempt {}/{})...",
                        request.host, e, attempts, request.max_transport_retries
                    );
                    self.transport.reconnect(&request.host).map_err(|e| {
                        LbError::Connection(format!(
                            "Unable to reconnect to {}: {}",
                            request.host, e
                        ))
                    })?;
                }
                Err(e) => {
                    return Err(LbError::Connection(format!(
                        "Request to {} failed: {}",
                        request.host, e
                    )));
                }
            }
        }
    }

    /// Swaps in a new session unless a concurrent call already replaced `stale`.
    async fn refresh_session(&self, stale: &Arc<Session>) -> Result<Arc<Session>> {
        let _guard = self.reauth.lock().await;

        let current = self.session();
        if !Arc::ptr_eq(&current, stale) {
            debug!("Session already refreshed by a concurrent request");
            return Ok(current);
        }

        self.replace_session().await
    }

    /// Caller must hold `self.reauth`.
    async fn replace_session(&self) -> Result<Arc<Session>> {
        info!(
            "Authentication token expired, re-authenticating as {}...",
            self.credentials.username()
        );
        let fresh = Arc::new(authenticate(&self.transport, &self.credentials, &self.endpoints).await?);
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        Ok(fresh)
    }

    fn build_request(&self, request: &ApiRequest, session: &Session) -> Result<HttpRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        // Always the current session's token, even over a caller-supplied one.
        let mut token = HeaderValue::from_str(&session.token).map_err(|_| {
            LbError::authentication("Authentication token is not a valid header value")
        })?;
        token.set_sensitive(true);
        headers.insert("x-auth-token", token);

        let length = request.body.as_ref().map_or(0, Vec::len);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));

        Ok(HttpRequest {
            method: request.method,
            url: request.url(),
            headers,
            body: request.body.clone(),
        })
    }

    fn log_request(&self, request: &HttpRequest) {
        if self.verbose {
            info!(
                "{} {} headers={:?}",
                request.method,
                request.url,
                request.redacted_headers()
            );
            if let Some(body) = &request.body {
                info!("Request body: {}", String::from_utf8_lossy(body));
            }
        } else {
            debug!("{} {}", request.method, request.url);
        }
    }

    fn log_response(&self, response: &Response) {
        if self.verbose {
            info!("Response {}: {}", response.status, response.text());
        } else {
            debug!("Response {}", response.status);
        }
    }
}

/// Runs `call`, failing with [`LbError::Connection`] once `limit` elapses.
async fn bounded<R>(
    limit: Option<Duration>,
    target: &str,
    call: impl Future<Output = Result<R>>,
) -> Result<R> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            LbError::Connection(format!("Request to {} timed out after {:?}", target, limit))
        })?,
        None => call.await,
    }
}
