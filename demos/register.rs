use std::path::PathBuf;

use async_trait::async_trait;
use clap::{CommandFactory, Parser};
use stevedore::{
    ConfigOverrides, ConfigStore, ContextResolver, Orchestrator, RegistrationGateway, Report,
    ResolvedCredentials, RunDefaults,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "stevedore-register",
    about = "Register kubeconfig contexts with a management service (dry run)"
)]
struct Cli {
    /// Path to the kubeconfig; defaults to KUBECONFIG or ~/.kube/config.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    #[arg(long, add = stevedore::context_value_completer(), conflicts_with = "all")]
    /// Register only this context.
    context: Option<String>,

    /// Register every context in the kubeconfig.
    #[arg(long)]
    all: bool,

    #[arg(long, default_value = "default")]
    namespace: String,

    #[arg(long, default_value = "default")]
    service_account: String,

    #[arg(long)]
    behind_firewall: bool,

    /// Name to register the cluster under; defaults to the context name.
    #[arg(long, requires = "context")]
    name: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

/// Logs each registration instead of calling a remote service.
struct DryRunGateway;

#[async_trait]
impl RegistrationGateway for DryRunGateway {
    async fn register(
        &self,
        credentials: ResolvedCredentials,
        display_name: &str,
        behind_firewall: bool,
    ) -> anyhow::Result<String> {
        info!(?credentials, display_name, behind_firewall, "dry run");
        Ok(format!("dry-run:{display_name}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stevedore::clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = match &cli.kubeconfig {
        Some(path) => ConfigStore::read_from(path)?,
        None => ConfigStore::read()?,
    };
    let defaults = RunDefaults::default()
        .with_namespace(&cli.namespace)
        .with_service_account(&cli.service_account)
        .with_behind_firewall(cli.behind_firewall);

    if let Some(context) = &cli.context {
        if !store.contains(context) {
            warn!(context = %context, "Context not found in kubeconfig, trying in cluster config");
        }
    }

    let mut orchestrator = Orchestrator::new(store, DryRunGateway, Report::new())
        .with_resolver(ContextResolver::new(ConfigOverrides::default()))
        .with_defaults(defaults);

    match (&cli.context, cli.all) {
        (Some(context), _) => {
            let name = cli.name.as_deref().unwrap_or(context);
            orchestrator
                .go_over_context_by_name(
                    context,
                    &cli.namespace,
                    &cli.service_account,
                    cli.behind_firewall,
                    name,
                )
                .await
        }
        (None, true) => orchestrator.go_over_all_contexts().await,
        (None, false) => orchestrator.go_over_current_context().await,
    }

    let report = orchestrator.into_reporter();
    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{report}");
    }

    if !report.is_all_success() {
        anyhow::bail!(
            "{} of {} contexts failed to register",
            report.failed().count(),
            report.len()
        );
    }
    Ok(())
}
