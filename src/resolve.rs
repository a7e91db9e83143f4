use anyhow::Context;
use kube::{
    Config,
    config::{KubeConfigOptions, KubeconfigError},
};
use tracing::{info, warn};

use crate::store::ConfigStore;

/// Loader used when a context cannot be built from the kubeconfig.
pub type InClusterLoader = fn() -> anyhow::Result<Config>;

/// Errors raised while turning a context name into a client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// Neither the named context nor the in-cluster environment yielded a config.
    #[error(
        "Failed to create config for context {context}: {primary}; in cluster config also failed: {fallback:#}"
    )]
    ConfigUnavailable {
        context: String,
        #[source]
        primary: KubeconfigError,
        fallback: anyhow::Error,
    },

    #[error("Invalid cluster server override {server:?}: {reason}")]
    InvalidServerOverride { server: String, reason: String },
}

/// Overrides applied on top of the named context.
///
/// The default carries no server override, so the host always comes from the
/// context's own cluster entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replace the API server URL of the resolved cluster.
    pub cluster_server: Option<String>,
    /// Treat this context as the current one instead of the file's pointer.
    pub current_context: Option<String>,
}

impl ConfigOverrides {
    pub fn with_cluster_server(mut self, server: impl Into<String>) -> Self {
        self.cluster_server = Some(server.into());
        self
    }

    pub fn with_current_context(mut self, context: impl Into<String>) -> Self {
        self.current_context = Some(context.into());
        self
    }
}

/// Builds a [`kube::Config`] for a named context.
#[derive(Debug, Clone)]
pub struct ContextResolver {
    overrides: ConfigOverrides,
    in_cluster: InClusterLoader,
}

impl ContextResolver {
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self {
            overrides,
            in_cluster: load_in_cluster_config,
        }
    }

    pub fn with_in_cluster_loader(mut self, loader: InClusterLoader) -> Self {
        self.in_cluster = loader;
        self
    }

    pub fn overrides(&self) -> &ConfigOverrides {
        &self.overrides
    }

    /// Resolve `context` from `store`, falling back to the in-cluster
    /// environment when the kubeconfig entry cannot be used.
    ///
    /// No request is sent to the cluster here.
    pub async fn resolve(
        &self,
        store: &ConfigStore,
        context: &str,
    ) -> Result<Config, ResolutionError> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };

        let mut config =
            match Config::from_custom_kubeconfig(store.kubeconfig().clone(), &options).await {
                Ok(config) => config,
                Err(primary) => {
                    warn!("Failed to create config with error: {primary}");
                    match (self.in_cluster)() {
                        Ok(config) => config,
                        Err(fallback) => {
                            warn!("Failed to create in cluster config with error: {fallback:#}");
                            return Err(ResolutionError::ConfigUnavailable {
                                context: context.to_string(),
                                primary,
                                fallback,
                            });
                        }
                    }
                }
            };

        if let Some(server) = &self.overrides.cluster_server {
            config.cluster_url = match server.parse() {
                Ok(uri) => uri,
                Err(e) => {
                    return Err(ResolutionError::InvalidServerOverride {
                        server: server.clone(),
                        reason: format!("{e}"),
                    });
                }
            };
        }

        info!("Created config for context");
        Ok(config)
    }
}

impl Default for ContextResolver {
    fn default() -> Self {
        Self::new(ConfigOverrides::default())
    }
}

/// Default [`InClusterLoader`], reading the pod's service account environment.
pub fn load_in_cluster_config() -> anyhow::Result<Config> {
    Config::incluster().context("not running inside a cluster")
}
