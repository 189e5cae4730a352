//! Account-level listings: load balancers, protocols and algorithms.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::Result;
use crate::http::{Method, Transport};

/// Status the service keeps reporting for removed load balancers.
pub const DELETED_STATUS: &str = "DELETED";

/// A load balancer as returned by the list call. Unmodelled fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LoadBalancer {
    pub fn is_deleted(&self) -> bool {
        self.status.as_deref() == Some(DELETED_STATUS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithm {
    pub name: String,
}

#[derive(Deserialize)]
struct LoadBalancerList {
    #[serde(rename = "loadBalancers")]
    load_balancers: Vec<LoadBalancer>,
}

#[derive(Deserialize)]
struct ProtocolList {
    protocols: Vec<Protocol>,
}

#[derive(Deserialize)]
struct AlgorithmList {
    algorithms: Vec<Algorithm>,
}

impl<T: Transport> Client<T> {
    /// Load balancers on the account, leaving out deleted ones unless `show_deleted`.
    pub async fn list_load_balancers(&self, show_deleted: bool) -> Result<Vec<LoadBalancer>> {
        let list: LoadBalancerList = self.get_json("/loadbalancers").await?;
        let total = list.load_balancers.len();

        let balancers: Vec<_> = list
            .load_balancers
            .into_iter()
            .filter(|lb| show_deleted || !lb.is_deleted())
            .collect();
        debug!("Listed {} load balancers ({} shown)", total, balancers.len());
        Ok(balancers)
    }

    /// Protocols the service can balance.
    pub async fn list_protocols(&self) -> Result<Vec<Protocol>> {
        let list: ProtocolList = self.get_json("/loadbalancers/protocols").await?;
        Ok(list.protocols)
    }

    /// Balancing algorithms the service supports.
    pub async fn list_algorithms(&self) -> Result<Vec<Algorithm>> {
        let list: AlgorithmList = self.get_json("/loadbalancers/algorithms").await?;
        Ok(list.algorithms)
    }

    async fn get_json<R: serde::de::DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.execute(self.request(Method::Get, path))
            .await?
            .error_for_fault()?
            .json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::EndpointTemplates;
    use crate::config::ClientConfig;
    use crate::error::{FaultKind, LbError};
    use mockito::{Server, ServerGuard};

    async fn connected(server: &mut ServerGuard) -> Client {
        let _auth = server
            .mock("GET", "/auth/v1.0")
            .with_status(204)
            .with_header("x-auth-token", "token-1")
            .with_header("x-server-management-url", "https://servers.example.com/v1.0/12345")
            .create_async()
            .await;

        let config = ClientConfig::new("user", "key", "dfw")
            .auth_url(format!("{}/auth/v1.0", server.url()))
            .endpoints(EndpointTemplates::uniform(format!("{}/v1.0/{{account}}", server.url())))
            .verbose(false);
        Client::connect(config).await.unwrap()
    }

    const BALANCERS: &str = r#"{"loadBalancers": [
        {"id": 1, "name": "web", "status": "ACTIVE", "protocol": "HTTP", "port": 80,
         "virtualIps": [{"id": 10, "type": "PUBLIC"}]},
        {"id": 2, "name": "old", "status": "DELETED"},
        {"id": 3, "name": "api", "status": "BUILD"}
    ]}"#;

    #[tokio::test]
    async fn test_list_load_balancers_hides_deleted() {
        let mut server = Server::new_async().await;
        let client = connected(&mut server).await;
        let list = server
            .mock("GET", "/v1.0/12345/loadbalancers")
            .match_header("x-auth-token", "token-1")
            .with_status(200)
            .with_body(BALANCERS)
            .expect(2)
            .create_async()
            .await;

        let shown = client.list_load_balancers(false).await.unwrap();
        let ids: Vec<u64> = shown.iter().map(|lb| lb.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(shown[0].port, Some(80));
        assert!(shown[0].extra.contains_key("virtualIps"));

        let all = client.list_load_balancers(true).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[1].is_deleted());

        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_protocols_and_algorithms() {
        let mut server = Server::new_async().await;
        let client = connected(&mut server).await;
        let _protocols = server
            .mock("GET", "/v1.0/12345/loadbalancers/protocols")
            .with_status(200)
            .with_body(r#"{"protocols": [{"name": "FTP", "port": 21}, {"name": "HTTP", "port": 80}]}"#)
            .create_async()
            .await;
        let _algorithms = server
            .mock("GET", "/v1.0/12345/loadbalancers/algorithms")
            .with_status(200)
            .with_body(r#"{"algorithms": [{"name": "RANDOM"}, {"name": "ROUND_ROBIN"}]}"#)
            .create_async()
            .await;

        let protocols = client.list_protocols().await.unwrap();
        assert_eq!(
            protocols[1],
            Protocol {
                name: "HTTP".to_string(),
                port: 80
            }
        );

        let algorithms = client.list_algorithms().await.unwrap();
        assert_eq!(algorithms.len(), 2);
        assert_eq!(algorithms[0].name, "RANDOM");
    }

    #[tokio::test]
    async fn test_listing_fault_is_raised() {
        let mut server = Server::new_async().await;
        let client = connected(&mut server).await;
        let _list = server
            .mock("GET", "/v1.0/12345/loadbalancers")
            .with_status(413)
            .with_body(r#"{"overLimit": {"message": "Rate limit exceeded", "code": 413}}"#)
            .create_async()
            .await;

        match client.list_load_balancers(false).await.unwrap_err() {
            LbError::Fault(fault) => {
                assert_eq!(fault.kind, FaultKind::OverLimit);
                assert_eq!(fault.status, 413);
            }
            other => panic!("Expected fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_listing_without_expected_key_is_json_error() {
        let mut server = Server::new_async().await;
        let client = connected(&mut server).await;
        let _algorithms = server
            .mock("GET", "/v1.0/12345/loadbalancers/algorithms")
            .with_status(200)
            .with_body(r#"{"unexpected": []}"#)
            .create_async()
            .await;

        assert!(matches!(
            client.list_algorithms().await,
            Err(LbError::Json(_))
        ));
    }
}
