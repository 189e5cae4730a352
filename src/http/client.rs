//! reqwest-backed transport.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::sync::{PoisonError, RwLock};

use super::retry::classify_error;
use super::{HttpRequest, Response, Transport, TransportError};

/// Transport over a pooled reqwest client.
///
/// Reconnecting swaps in a freshly built client, which drops every pooled
/// connection held by the previous one.
pub struct HttpTransport {
    client: RwLock<Client>,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self::from_client(build_client()?))
    }

    /// Wraps an existing client. Reconnects still build clients with the default settings.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: RwLock::new(client),
        }
    }

    fn current(&self) -> Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn build_client() -> Result<Client, TransportError> {
    Client::builder()
        .user_agent(crate::user_agent())
        .build()
        .map_err(classify_error)
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &HttpRequest) -> Result<Response, TransportError> {
        let client = self.current();

        let mut builder = client
            .request(request.method.into(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_error)?.to_vec();

        debug!("{} {} -> {} ({} bytes)", request.method, request.url, status, body.len());

        Ok(Response {
            status,
            headers,
            body,
        })
    }

    fn reconnect(&self, host: &str) -> Result<(), TransportError> {
        debug!("Re-establishing connection to {}...", host);
        let fresh = build_client()?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }
}
