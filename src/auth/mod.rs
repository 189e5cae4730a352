//! Credentials, regions and the authentication handshake.
//!
//! # Structure
//!
//! - `session` - the immutable [`Session`] value and [`authenticate`]

pub(crate) mod session;

use std::fmt;
use std::str::FromStr;

use crate::error::{LbError, Result};

pub use session::{API_VERSION, Endpoint, Session, authenticate};

/// Placeholder in endpoint templates replaced by the numeric account id.
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

/// Datacenters that host the load balancer management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Chicago
    Ord,
    /// Dallas/Fort Worth
    Dfw,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Ord => write!(f, "ord"),
            Region::Dfw => write!(f, "dfw"),
        }
    }
}

impl FromStr for Region {
    type Err = LbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ord" => Ok(Region::Ord),
            "dfw" => Ok(Region::Dfw),
            _ => Err(LbError::authentication(format!(
                "Unknown region: {}. Expected ord or dfw.",
                s
            ))),
        }
    }
}

/// Management URL templates per region, each containing [`ACCOUNT_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplates {
    pub ord: String,
    pub dfw: String,
}

impl Default for EndpointTemplates {
    fn default() -> Self {
        Self {
            ord: "https://ord.loadbalancers.api.rackspacecloud.com/v1.0/{account}".to_string(),
            dfw: "https://dfw.loadbalancers.api.rackspacecloud.com/v1.0/{account}".to_string(),
        }
    }
}

impl EndpointTemplates {
    /// Uses the same template for every region, e.g. a private deployment.
    pub fn uniform(template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            ord: template.clone(),
            dfw: template,
        }
    }

    pub fn for_region(&self, region: Region) -> &str {
        match region {
            Region::Ord => &self.ord,
            Region::Dfw => &self.dfw,
        }
    }

    pub fn management_url(&self, region: Region, account_id: &str) -> String {
        self.for_region(region).replace(ACCOUNT_PLACEHOLDER, account_id)
    }
}

/// Account credentials. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    api_key: String,
    region: String,
    auth_url: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        api_key: impl Into<String>,
        region: impl Into<String>,
        auth_url: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Self {
            username: username.into(),
            api_key: api_key.into(),
            region: region.into(),
            auth_url: auth_url.into(),
        };

        if credentials.username.is_empty() {
            return Err(LbError::MissingArgument("Must supply a username".to_string()));
        }
        if credentials.api_key.is_empty() {
            return Err(LbError::MissingArgument("Must supply an API key".to_string()));
        }
        if credentials.region.is_empty() {
            return Err(LbError::MissingArgument("Must supply a region".to_string()));
        }
        if credentials.auth_url.is_empty() {
            return Err(LbError::MissingArgument(
                "Must supply an authentication URL".to_string(),
            ));
        }

        Ok(credentials)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The region as supplied; resolved against [`Region`] at authentication time.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"[redacted]")
            .field("region", &self.region)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parsing() {
        assert_eq!("ord".parse::<Region>().unwrap(), Region::Ord);
        assert_eq!("dfw".parse::<Region>().unwrap(), Region::Dfw);
        assert!("DFW".parse::<Region>().is_err());
        assert!(" ord".parse::<Region>().is_err());
        assert!(matches!(
            "lon".parse::<Region>(),
            Err(LbError::Authentication { status: None, .. })
        ));
    }

    #[test]
    fn test_region_display_round_trips() {
        for region in [Region::Ord, Region::Dfw] {
            assert_eq!(region.to_string().parse::<Region>().unwrap(), region);
        }
    }

    #[test]
    fn test_default_templates() {
        let templates = EndpointTemplates::default();
        assert_eq!(
            templates.management_url(Region::Dfw, "42"),
            "https://dfw.loadbalancers.api.rackspacecloud.com/v1.0/42"
        );
        assert_eq!(
            templates.management_url(Region::Ord, "42"),
            "https://ord.loadbalancers.api.rackspacecloud.com/v1.0/42"
        );
    }

    #[test]
    fn test_uniform_templates() {
        let templates = EndpointTemplates::uniform("http://127.0.0.1:8080/v1.0/{account}");
        assert_eq!(
            templates.management_url(Region::Ord, "7"),
            templates.management_url(Region::Dfw, "7")
        );
    }

    #[test]
    fn test_credentials_require_every_field() {
        assert!(Credentials::new("user", "key", "dfw", "https://auth").is_ok());

        let err = Credentials::new("", "key", "dfw", "https://auth").unwrap_err();
        assert!(matches!(err, LbError::MissingArgument(msg) if msg.contains("username")));

        let err = Credentials::new("user", "", "dfw", "https://auth").unwrap_err();
        assert!(matches!(err, LbError::MissingArgument(msg) if msg.contains("API key")));

        let err = Credentials::new("user", "key", "", "https://auth").unwrap_err();
        assert!(matches!(err, LbError::MissingArgument(msg) if msg.contains("region")));
    }

    #[test]
    fn test_credentials_debug_hides_api_key() {
        let credentials = Credentials::new("user", "s3cret", "dfw", "https://auth").unwrap();
        let shown = format!("{:?}", credentials);
        assert!(shown.contains("user"));
        assert!(!shown.contains("s3cret"));
    }
}
