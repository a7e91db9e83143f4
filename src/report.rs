use std::fmt;

use serde::Serialize;

/// Whether a context ended up registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Final result for one processed context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum Outcome {
    /// `result` is the registration service's response.
    Success { context: String, result: String },
    Failed { context: String, reason: String },
}

impl Outcome {
    pub fn new(context: &str, status: OutcomeStatus, message: String) -> Self {
        let context = context.to_string();
        match status {
            OutcomeStatus::Success => Self::Success {
                context,
                result: message,
            },
            OutcomeStatus::Failed => Self::Failed {
                context,
                reason: message,
            },
        }
    }

    pub fn context(&self) -> &str {
        match self {
            Self::Success { context, .. } | Self::Failed { context, .. } => context,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Success { .. } => OutcomeStatus::Success,
            Self::Failed { .. } => OutcomeStatus::Failed,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { result, .. } => result,
            Self::Failed { reason, .. } => reason,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == OutcomeStatus::Success
    }
}

/// Append-only sink for per-context outcomes.
///
/// Calls arrive in processing order, one per context.
pub trait Reporter {
    fn record(&mut self, context: &str, status: OutcomeStatus, message: String);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn record(&mut self, context: &str, status: OutcomeStatus, message: String) {
        (**self).record(context, status, message)
    }
}

/// In-memory [`Reporter`] keeping every outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report {
    outcomes: Vec<Outcome>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, context: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.context() == context)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_all_success(&self) -> bool {
        self.outcomes.iter().all(Outcome::is_success)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Reporter for Report {
    fn record(&mut self, context: &str, status: OutcomeStatus, message: String) {
        self.outcomes.push(Outcome::new(context, status, message));
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            // Multi-line errors are flattened so each context stays on one row.
            let message = outcome.message().replace('\n', " ");
            writeln!(f, "{}\t{}\t{}", outcome.context(), outcome.status(), message)?;
        }
        Ok(())
    }
}
