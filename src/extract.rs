use std::fmt;

use k8s_openapi::api::core::v1::Secret;
use kube::{Config, Error as KubeError};
use tracing::{info, warn};

use crate::cluster::ClusterConnector;

const TOKEN_KEY: &str = "token";
const CA_KEY: &str = "ca.crt";

/// Host, bearer token and CA bundle for one cluster.
///
/// Handed to the registration gateway by value, so it is used exactly once.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub host: String,
    pub token: Vec<u8>,
    pub ca: Vec<u8>,
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("host", &self.host)
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .field("ca", &format_args!("<{} bytes>", self.ca.len()))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to create kubernetes client with error: {0}")]
    ClientCreationFailed(#[source] KubeError),

    #[error("Service account: {name} not found in namespace: {namespace}")]
    ServiceAccountNotFound { namespace: String, name: String },

    #[error("Failed to get service account {name} in namespace {namespace} with error: {source}")]
    ServiceAccountFetchFailed {
        namespace: String,
        name: String,
        source: KubeError,
    },

    #[error("Service account has no secret configured for serviceaccount: {name}")]
    NoSecretBound { name: String },

    #[error("Failed to get secret {name} in namespace {namespace}{}", fetch_reason(.source))]
    SecretFetchFailed {
        namespace: String,
        name: String,
        source: Option<KubeError>,
    },
}

fn fetch_reason(source: &Option<KubeError>) -> String {
    match source {
        Some(e) => format!(" with error: {e}"),
        None => String::from(": not found"),
    }
}

/// Pull the service account token and CA certificate out of the cluster
/// described by `config`.
///
/// Only the first secret bound to the service account is read. A secret
/// missing `token` or `ca.crt` yields empty bytes for that field.
pub async fn extract(
    connector: &dyn ClusterConnector,
    config: Config,
    namespace: &str,
    service_account: &str,
) -> Result<ResolvedCredentials, ExtractionError> {
    let host = config.cluster_url.to_string().trim_end_matches('/').to_string();

    info!("Creating rest client");
    let client = connector
        .connect(config)
        .map_err(ExtractionError::ClientCreationFailed)?;
    info!("Created client set for context");

    if service_account.is_empty() {
        return Err(ExtractionError::ServiceAccountNotFound {
            namespace: namespace.to_string(),
            name: service_account.to_string(),
        });
    }

    info!("Fetching service account from cluster");
    let sa = client
        .get_service_account(namespace, service_account)
        .await
        .map_err(|source| ExtractionError::ServiceAccountFetchFailed {
            namespace: namespace.to_string(),
            name: service_account.to_string(),
            source,
        })?
        .ok_or_else(|| ExtractionError::ServiceAccountNotFound {
            namespace: namespace.to_string(),
            name: service_account.to_string(),
        })?;

    let reference = sa
        .secrets
        .as_ref()
        .and_then(|secrets| secrets.first())
        .ok_or_else(|| ExtractionError::NoSecretBound {
            name: service_account.to_string(),
        })?;
    let secret_name = reference
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ExtractionError::NoSecretBound {
            name: service_account.to_string(),
        })?;
    // The reference may point outside the requested namespace.
    let secret_namespace = reference
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .or_else(|| sa.metadata.namespace.clone().filter(|ns| !ns.is_empty()))
        .unwrap_or_else(|| namespace.to_string());
    info!(
        secret_name = %secret_name,
        namespace = %secret_namespace,
        "Found service account associated with secret"
    );

    info!("Fetching secret from cluster");
    let secret = match client.get_secret(&secret_namespace, &secret_name).await {
        Ok(Some(secret)) => secret,
        Ok(None) => {
            return Err(ExtractionError::SecretFetchFailed {
                namespace: secret_namespace,
                name: secret_name,
                source: None,
            });
        }
        Err(e) => {
            return Err(ExtractionError::SecretFetchFailed {
                namespace: secret_namespace,
                name: secret_name,
                source: Some(e),
            });
        }
    };
    info!("Found secret");

    Ok(ResolvedCredentials {
        host,
        token: secret_field(&secret, TOKEN_KEY),
        ca: secret_field(&secret, CA_KEY),
    })
}

fn secret_field(secret: &Secret, key: &str) -> Vec<u8> {
    match secret.data.as_ref().and_then(|data| data.get(key)) {
        Some(value) => value.0.clone(),
        None => {
            warn!(key, "Secret has no such key, using empty value");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{
        ByteString,
        api::core::v1::{ObjectReference, ServiceAccount},
        apimachinery::pkg::apis::meta::v1::ObjectMeta,
    };
    use kube::core::ErrorResponse;

    use super::*;
    use crate::cluster::{ClusterClient, MockClusterClient, MockClusterConnector};

    fn config() -> Config {
        Config::new("https://ctx-a.example:6443".parse().expect("valid uri"))
    }

    fn api_error(code: u16) -> KubeError {
        KubeError::Api(ErrorResponse {
            status: "Failure".into(),
            message: format!("status={code}"),
            reason: "Test".into(),
            code,
        })
    }

    fn service_account(namespace: &str, secrets: &[(&str, Option<&str>)]) -> ServiceAccount {
        ServiceAccount {
            metadata: ObjectMeta {
                name: Some("codefresh".into()),
                namespace: Some(namespace.into()),
                ..Default::default()
            },
            secrets: Some(
                secrets
                    .iter()
                    .map(|(name, ns)| ObjectReference {
                        name: Some(name.to_string()),
                        namespace: ns.map(str::to_string),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn secret(data: &[(&str, &str)]) -> Secret {
        Secret {
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    fn connector_for(client: MockClusterClient) -> MockClusterConnector {
        let mut connector = MockClusterConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move |_| Ok(Box::new(client) as Box<dyn ClusterClient>));
        connector
    }

    #[tokio::test]
    async fn extracts_token_and_ca_from_bound_secret() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .withf(|ns, name| ns == "default" && name == "codefresh")
            .returning(|_, _| Ok(Some(service_account("default", &[("codefresh-token-xyz", None)]))));
        client
            .expect_get_secret()
            .withf(|ns, name| ns == "default" && name == "codefresh-token-xyz")
            .returning(|_, _| Ok(Some(secret(&[("token", "abc"), ("ca.crt", "ca-bytes")]))));

        let connector = connector_for(client);
        let credentials = extract(&connector, config(), "default", "codefresh")
            .await
            .expect("extraction should succeed");

        assert_eq!(credentials.host, "https://ctx-a.example:6443");
        assert_eq!(credentials.token, b"abc");
        assert_eq!(credentials.ca, b"ca-bytes");
    }

    #[tokio::test]
    async fn uses_only_the_first_bound_secret() {
        let mut client = MockClusterClient::new();
        client.expect_get_service_account().returning(|_, _| {
            Ok(Some(service_account("default", &[("s1", None), ("s2", None)])))
        });
        client
            .expect_get_secret()
            .withf(|_, name| name == "s1")
            .times(1)
            .returning(|_, _| Ok(Some(secret(&[("token", "first")]))));

        let connector = connector_for(client);
        let credentials = extract(&connector, config(), "default", "codefresh")
            .await
            .expect("first secret is valid");
        assert_eq!(credentials.token, b"first");
    }

    #[tokio::test]
    async fn missing_keys_yield_empty_bytes() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("default", &[("s1", None)]))));
        client
            .expect_get_secret()
            .returning(|_, _| Ok(Some(secret(&[("ca.crt", "ca-bytes")]))));

        let connector = connector_for(client);
        let credentials = extract(&connector, config(), "default", "codefresh")
            .await
            .expect("missing token is tolerated");
        assert!(credentials.token.is_empty());
        assert_eq!(credentials.ca, b"ca-bytes");
    }

    #[tokio::test]
    async fn secret_without_data_yields_empty_credentials() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("default", &[("s1", None)]))));
        client
            .expect_get_secret()
            .returning(|_, _| Ok(Some(Secret::default())));

        let connector = connector_for(client);
        let credentials = extract(&connector, config(), "default", "codefresh")
            .await
            .expect("empty secret is tolerated");
        assert!(credentials.token.is_empty());
        assert!(credentials.ca.is_empty());
    }

    #[tokio::test]
    async fn reads_secret_from_the_referenced_namespace() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("default", &[("s1", Some("infra"))]))));
        client
            .expect_get_secret()
            .withf(|ns, name| ns == "infra" && name == "s1")
            .times(1)
            .returning(|_, _| Ok(Some(secret(&[("token", "abc")]))));

        let connector = connector_for(client);
        extract(&connector, config(), "default", "codefresh")
            .await
            .expect("secret lives in infra");
    }

    #[tokio::test]
    async fn falls_back_to_service_account_namespace() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("kube-system", &[("s1", None)]))));
        client
            .expect_get_secret()
            .withf(|ns, _| ns == "kube-system")
            .times(1)
            .returning(|_, _| Ok(Some(secret(&[("token", "abc")]))));

        let connector = connector_for(client);
        extract(&connector, config(), "default", "codefresh")
            .await
            .expect("secret lives next to the service account");
    }

    #[tokio::test]
    async fn empty_reference_namespace_uses_service_account_namespace() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("kube-system", &[("s1", Some(""))]))));
        client
            .expect_get_secret()
            .withf(|ns, name| ns == "kube-system" && name == "s1")
            .times(1)
            .returning(|_, _| Ok(Some(secret(&[("token", "abc")]))));

        let connector = connector_for(client);
        extract(&connector, config(), "default", "codefresh")
            .await
            .expect("empty reference namespace is ignored");
    }

    #[tokio::test]
    async fn client_creation_failure_stops_before_any_query() {
        let mut connector = MockClusterConnector::new();
        connector
            .expect_connect()
            .returning(|_| Err(api_error(500)));

        let err = extract(&connector, config(), "default", "codefresh")
            .await
            .expect_err("connector fails");
        assert!(matches!(err, ExtractionError::ClientCreationFailed(_)));
    }

    #[tokio::test]
    async fn absent_service_account_is_not_found() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(None));
        client.expect_get_secret().never();

        let connector = connector_for(client);
        let err = extract(&connector, config(), "default", "codefresh")
            .await
            .expect_err("service account is absent");
        match err {
            ExtractionError::ServiceAccountNotFound { namespace, name } => {
                assert_eq!(namespace, "default");
                assert_eq!(name, "codefresh");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_service_account_name_skips_the_query() {
        let mut client = MockClusterClient::new();
        client.expect_get_service_account().never();

        let connector = connector_for(client);
        let err = extract(&connector, config(), "", "")
            .await
            .expect_err("no service account requested");
        assert!(matches!(err, ExtractionError::ServiceAccountNotFound { .. }));
    }

    #[tokio::test]
    async fn api_error_on_service_account_is_reported() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Err(api_error(403)));

        let connector = connector_for(client);
        let err = extract(&connector, config(), "default", "codefresh")
            .await
            .expect_err("forbidden");
        assert!(matches!(
            err,
            ExtractionError::ServiceAccountFetchFailed { .. }
        ));
    }

    #[tokio::test]
    async fn service_account_without_secrets_fails() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("default", &[]))));
        client.expect_get_secret().never();

        let connector = connector_for(client);
        let err = extract(&connector, config(), "default", "codefresh")
            .await
            .expect_err("no secret bound");
        assert!(matches!(&err, ExtractionError::NoSecretBound { name } if name == "codefresh"));
        assert!(err.to_string().contains("no secret"));
        assert!(err.to_string().contains("codefresh"));
    }

    #[tokio::test]
    async fn missing_secret_fails_fetch() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("default", &[("s1", None)]))));
        client.expect_get_secret().returning(|_, _| Ok(None));

        let connector = connector_for(client);
        let err = extract(&connector, config(), "default", "codefresh")
            .await
            .expect_err("secret is gone");
        assert!(matches!(
            err,
            ExtractionError::SecretFetchFailed { source: None, .. }
        ));
    }

    #[tokio::test]
    async fn api_error_on_secret_fails_fetch() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("default", &[("s1", None)]))));
        client
            .expect_get_secret()
            .returning(|_, _| Err(api_error(403)));

        let connector = connector_for(client);
        let err = extract(&connector, config(), "default", "codefresh")
            .await
            .expect_err("secret read is forbidden");
        assert!(matches!(
            err,
            ExtractionError::SecretFetchFailed { source: Some(_), .. }
        ));
        assert!(err.to_string().contains("with error"));
    }

    #[tokio::test]
    async fn missing_ca_yields_empty_bytes() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service_account()
            .returning(|_, _| Ok(Some(service_account("default", &[("s1", None)]))));
        client
            .expect_get_secret()
            .returning(|_, _| Ok(Some(secret(&[("token", "abc")]))));

        let connector = connector_for(client);
        let credentials = extract(&connector, config(), "default", "codefresh")
            .await
            .expect("missing ca.crt is tolerated");
        assert_eq!(credentials.token, b"abc");
        assert!(credentials.ca.is_empty());
    }

    #[test]
    fn debug_output_hides_token() {
        let credentials = ResolvedCredentials {
            host: "https://ctx-a.example:6443".into(),
            token: b"super-secret".to_vec(),
            ca: b"ca".to_vec(),
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<12 bytes>"));
    }
}
