//! Errors that end the processing of a single context.

use crate::{extract::ExtractionError, resolve::ResolutionError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The registration service rejected the cluster. Never retried.
    #[error("Failed to add cluster with error: {0:#}")]
    RegistrationFailed(anyhow::Error),

    /// The kubeconfig does not say which context is current.
    #[error("Failed to read current context: {0}")]
    RawConfigUnavailable(String),
}
