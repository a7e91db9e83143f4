//! Drives registration over one, all, or the current kubeconfig context.
//!
//! Each context runs through resolve, extract and register in turn. Whatever
//! happens, exactly one outcome is recorded per context, and a failing context
//! never stops the ones after it. Contexts are processed one at a time.

use tracing::{Instrument, error, info, info_span};

use crate::{
    Error,
    cluster::{ClusterConnector, KubeConnector},
    extract::extract,
    register::RegistrationGateway,
    report::{OutcomeStatus, Reporter},
    resolve::ContextResolver,
    store::ConfigStore,
};

/// Label used when the current context itself cannot be determined.
pub const CURRENT_CONTEXT_LABEL: &str = "current-context";

/// Caller-level defaults for the modes that don't take explicit parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunDefaults {
    pub namespace: String,
    pub service_account: String,
    pub behind_firewall: bool,
}

impl RunDefaults {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_service_account(mut self, service_account: impl Into<String>) -> Self {
        self.service_account = service_account.into();
        self
    }

    pub fn with_behind_firewall(mut self, behind_firewall: bool) -> Self {
        self.behind_firewall = behind_firewall;
        self
    }
}

/// Everything needed to process one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub context: String,
    pub namespace: String,
    pub service_account: String,
    pub behind_firewall: bool,
    /// Name the cluster is registered under.
    pub display_name: String,
}

impl ResolutionRequest {
    /// Request for `context` registered under its own name.
    pub fn with_defaults(context: &str, defaults: &RunDefaults) -> Self {
        Self {
            context: context.to_string(),
            namespace: defaults.namespace.clone(),
            service_account: defaults.service_account.clone(),
            behind_firewall: defaults.behind_firewall,
            display_name: context.to_string(),
        }
    }
}

pub struct Orchestrator<G, R> {
    store: ConfigStore,
    resolver: ContextResolver,
    connector: Box<dyn ClusterConnector>,
    gateway: G,
    reporter: R,
    defaults: RunDefaults,
}

impl<G, R> Orchestrator<G, R>
where
    G: RegistrationGateway,
    R: Reporter,
{
    pub fn new(store: ConfigStore, gateway: G, reporter: R) -> Self {
        Self {
            store,
            resolver: ContextResolver::default(),
            connector: Box::new(KubeConnector),
            gateway,
            reporter,
            defaults: RunDefaults::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: ContextResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_connector(mut self, connector: impl ClusterConnector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    pub fn with_defaults(mut self, defaults: RunDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Register every context in the kubeconfig under its own name.
    pub async fn go_over_all_contexts(&mut self) {
        for context in self.store.context_names() {
            let request = ResolutionRequest::with_defaults(&context, &self.defaults);
            self.process_context(request).await;
        }
    }

    /// Register one context with explicit parameters.
    pub async fn go_over_context_by_name(
        &mut self,
        context: &str,
        namespace: &str,
        service_account: &str,
        behind_firewall: bool,
        display_name: &str,
    ) {
        let request = ResolutionRequest {
            context: context.to_string(),
            namespace: namespace.to_string(),
            service_account: service_account.to_string(),
            behind_firewall,
            display_name: display_name.to_string(),
        };
        self.process_context(request).await;
    }

    /// Register whichever context the kubeconfig currently points at.
    ///
    /// If that pointer is missing a single failure is recorded under
    /// [`CURRENT_CONTEXT_LABEL`] and no cluster is contacted.
    pub async fn go_over_current_context(&mut self) {
        let context = match self.store.current_context(self.resolver.overrides()) {
            Ok(context) => context,
            Err(e) => {
                error!("{e}");
                self.reporter
                    .record(CURRENT_CONTEXT_LABEL, OutcomeStatus::Failed, e.to_string());
                return;
            }
        };
        let request = ResolutionRequest::with_defaults(&context, &self.defaults);
        self.process_context(request).await;
    }

    /// Run one request to completion and record its outcome.
    pub async fn process_context(&mut self, request: ResolutionRequest) {
        let span = info_span!(
            "context",
            context_name = %request.context,
            namespace = %request.namespace,
            serviceaccount = %request.service_account,
            behind_firewall = request.behind_firewall,
            display_name = %request.display_name,
        );

        let result = self.register_context(&request).instrument(span.clone()).await;
        let _guard = span.enter();
        match result {
            Ok(response) => {
                info!("Cluster added!");
                self.reporter
                    .record(&request.context, OutcomeStatus::Success, response);
            }
            Err(e) => {
                error!("{e}");
                self.reporter
                    .record(&request.context, OutcomeStatus::Failed, e.to_string());
            }
        }
    }

    async fn register_context(&self, request: &ResolutionRequest) -> Result<String, Error> {
        info!("Working on context");
        let config = self.resolver.resolve(&self.store, &request.context).await?;
        let credentials = extract(
            &*self.connector,
            config,
            &request.namespace,
            &request.service_account,
        )
        .await?;

        info!("Registering cluster");
        self.gateway
            .register(credentials, &request.display_name, request.behind_firewall)
            .await
            .map_err(Error::RegistrationFailed)
    }
}
