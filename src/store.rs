use std::path::Path;

use anyhow::Context;
use kube::config::Kubeconfig;

use crate::{Error, resolve::ConfigOverrides};

/// Parsed multi-context kubeconfig the rest of the crate reads from.
///
/// Loading is the only step allowed to abort a whole run; everything after it
/// fails per context.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    kubeconfig: Kubeconfig,
}

impl ConfigStore {
    /// Load the kubeconfig the way `kubectl` does, honouring `KUBECONFIG`
    /// and falling back to `~/.kube/config`.
    pub fn read() -> anyhow::Result<Self> {
        let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
        Ok(Self::from_kubeconfig(kubeconfig))
    }

    /// Load a single kubeconfig file at `path`.
    pub fn read_from(path: &Path) -> anyhow::Result<Self> {
        let kubeconfig = Kubeconfig::read_from(path)
            .with_context(|| format!("Failed to read kubeconfig at {:?}", path))?;
        Ok(Self::from_kubeconfig(kubeconfig))
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        Self { kubeconfig }
    }

    pub fn kubeconfig(&self) -> &Kubeconfig {
        &self.kubeconfig
    }

    /// Names of every context, in file order.
    pub fn context_names(&self) -> Vec<String> {
        self.kubeconfig
            .contexts
            .iter()
            .map(|named_context| named_context.name.clone())
            .collect()
    }

    pub fn contains(&self, context: &str) -> bool {
        self.kubeconfig.contexts.iter().any(|c| c.name == context)
    }

    /// Resolve the context the configuration currently points at.
    ///
    /// An override wins over the file's `current-context`.
    ///
    /// # Errors
    /// Returns [`Error::RawConfigUnavailable`] if neither names a context.
    pub fn current_context(&self, overrides: &ConfigOverrides) -> Result<String, Error> {
        overrides
            .current_context
            .as_ref()
            .or(self.kubeconfig.current_context.as_ref())
            .filter(|name| !name.is_empty())
            .cloned()
            .ok_or_else(|| Error::RawConfigUnavailable(String::from("current-context is not set")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(yaml: &str) -> ConfigStore {
        ConfigStore::from_kubeconfig(Kubeconfig::from_yaml(yaml).expect("valid kubeconfig"))
    }

    const TWO_CONTEXTS: &str = r#"
apiVersion: v1
kind: Config
current-context: staging
clusters:
- name: staging
  cluster:
    server: https://staging.example:6443
users:
- name: admin
  user:
    token: abc
contexts:
- name: staging
  context:
    cluster: staging
    user: admin
- name: production
  context:
    cluster: staging
    user: admin
"#;

    #[test]
    fn lists_context_names_in_file_order() {
        let store = store(TWO_CONTEXTS);
        assert_eq!(store.context_names(), vec!["staging", "production"]);
        assert!(store.contains("production"));
        assert!(!store.contains("dev"));
    }

    #[test]
    fn current_context_comes_from_file() {
        let store = store(TWO_CONTEXTS);
        let current = store.current_context(&ConfigOverrides::default()).unwrap();
        assert_eq!(current, "staging");
    }

    #[test]
    fn current_context_override_wins() {
        let store = store(TWO_CONTEXTS);
        let overrides = ConfigOverrides::default().with_current_context("production");
        assert_eq!(store.current_context(&overrides).unwrap(), "production");
    }

    #[test]
    fn missing_current_context_is_an_error() {
        let store = store(
            r#"
apiVersion: v1
kind: Config
contexts: []
"#,
        );
        let err = store
            .current_context(&ConfigOverrides::default())
            .expect_err("no current context configured");
        assert!(matches!(err, Error::RawConfigUnavailable(_)));
    }

    #[test]
    fn read_from_missing_file_fails_with_path() {
        let err = ConfigStore::read_from(Path::new("/definitely/not/here/config"))
            .expect_err("file does not exist");
        assert!(err.to_string().contains("/definitely/not/here/config"));
    }
}
