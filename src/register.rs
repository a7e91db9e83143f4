use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::extract::ResolvedCredentials;

/// Remote management service that clusters get registered with.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistrationGateway: Send + Sync {
    /// Register one cluster under `display_name`.
    ///
    /// # Arguments
    ///
    /// * `credentials` - Host, token and CA of the cluster
    /// * `display_name` - Name the cluster is listed under remotely
    /// * `behind_firewall` - The service cannot reach the cluster directly
    ///
    /// # Returns
    ///
    /// The service's response, kept only for reporting
    async fn register(
        &self,
        credentials: ResolvedCredentials,
        display_name: &str,
        behind_firewall: bool,
    ) -> anyhow::Result<String>;
}
