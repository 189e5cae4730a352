//! Client configuration.

use log::debug;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::auth::{Credentials, EndpointTemplates};
use crate::error::{LbError, Result};

/// Identity endpoint for US accounts.
pub const AUTH_USA: &str = "https://auth.api.rackspacecloud.com/v1.0";

/// Identity endpoint for UK accounts.
pub const AUTH_UK: &str = "https://lon.auth.api.rackspacecloud.com/v1.0";

/// When set, every request and response is logged in full (credentials masked).
pub const VERBOSE_ENV: &str = "LOADBALANCERS_VERBOSE";

pub const USERNAME_ENV: &str = "CLOUDLB_USERNAME";
pub const API_KEY_ENV: &str = "CLOUDLB_API_KEY";
pub const REGION_ENV: &str = "CLOUDLB_REGION";
pub const AUTH_URL_ENV: &str = "CLOUDLB_AUTH_URL";

/// Which identity service an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthRegion {
    #[default]
    Usa,
    Uk,
}

impl AuthRegion {
    pub fn url(&self) -> &'static str {
        match self {
            AuthRegion::Usa => AUTH_USA,
            AuthRegion::Uk => AUTH_UK,
        }
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    pub username: String,
    pub api_key: String,
    pub region: String,
    pub auth_url: String,
    /// Re-authenticate and retry once when a token expires.
    pub retry_auth: bool,
    pub verbose: bool,
    /// Upper bound on a whole `execute` call, retries included.
    pub timeout: Option<Duration>,
    pub endpoints: EndpointTemplates,
}

impl ClientConfig {
    pub fn new(
        username: impl Into<String>,
        api_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
            region: region.into(),
            auth_url: AUTH_USA.to_string(),
            retry_auth: true,
            verbose: verbose_from_env(),
            timeout: None,
            endpoints: EndpointTemplates::default(),
        }
    }

    /// Reads the configuration from `CLOUDLB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let username = required_env(USERNAME_ENV)?;
        let api_key = required_env(API_KEY_ENV)?;
        let region = required_env(REGION_ENV)?;

        let mut config = Self::new(username, api_key, region);
        if let Ok(url) = env::var(AUTH_URL_ENV) {
            debug!("Using authentication URL from {}: {}", AUTH_URL_ENV, url);
            config.auth_url = url;
        }
        Ok(config)
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn auth_region(mut self, region: AuthRegion) -> Self {
        self.auth_url = region.url().to_string();
        self
    }

    pub fn retry_auth(mut self, retry: bool) -> Self {
        self.retry_auth = retry;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointTemplates) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Validates and freezes the credential fields.
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::new(
            self.username.as_str(),
            self.api_key.as_str(),
            self.region.as_str(),
            self.auth_url.as_str(),
        )
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("username", &self.username)
            .field("api_key", &"[redacted]")
            .field("region", &self.region)
            .field("auth_url", &self.auth_url)
            .field("retry_auth", &self.retry_auth)
            .field("verbose", &self.verbose)
            .field("timeout", &self.timeout)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

pub fn verbose_from_env() -> bool {
    env::var_os(VERBOSE_ENV).is_some()
}

fn required_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(LbError::MissingArgument(format!(
            "Environment variable {} is not set",
            key
        ))),
    }
}
