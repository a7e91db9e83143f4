#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use clap_complete;
pub use k8s_openapi;
pub use kube;

pub mod claputil;
pub use claputil::context_value_completer;
pub mod cluster;
pub use cluster::{ClusterClient, ClusterConnector, KubeClusterClient, KubeConnector};
pub mod error;
pub use error::Error;
pub mod extract;
pub use extract::{ExtractionError, ResolvedCredentials, extract};
pub mod orchestrator;
pub use orchestrator::{CURRENT_CONTEXT_LABEL, Orchestrator, ResolutionRequest, RunDefaults};
pub mod register;
pub use register::RegistrationGateway;
pub mod report;
pub use report::{Outcome, OutcomeStatus, Report, Reporter};
pub mod resolve;
pub use resolve::{ConfigOverrides, ContextResolver, ResolutionError};
pub mod store;
pub use store::ConfigStore;
