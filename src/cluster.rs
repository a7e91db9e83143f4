use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::{Api, Client, Config, Error as KubeError};

#[cfg(test)]
use mockall::automock;

/// Read access to the objects credential extraction needs from a cluster.
///
/// `Ok(None)` means the object does not exist; any other failure is an `Err`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, KubeError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, KubeError>;
}

/// Turns a resolved [`Config`] into a live [`ClusterClient`].
#[cfg_attr(test, automock)]
pub trait ClusterConnector: Send + Sync {
    fn connect(&self, config: Config) -> Result<Box<dyn ClusterClient>, KubeError>;
}

/// [`ClusterClient`] backed by the cluster's API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, KubeError> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, KubeError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }
}

/// Connects with [`kube::Client`].
///
/// Must be called from within a Tokio runtime. Timeouts come from the
/// [`Config`] (`connect_timeout`, `read_timeout`), not from this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeConnector;

impl ClusterConnector for KubeConnector {
    fn connect(&self, config: Config) -> Result<Box<dyn ClusterClient>, KubeError> {
        let client = Client::try_from(config)?;
        Ok(Box::new(KubeClusterClient::new(client)))
    }
}
