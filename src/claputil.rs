use std::ffi::OsStr;

use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};

use crate::store::ConfigStore;

/// Create an `ArgValueCompleter` that lists contexts from the active kubeconfig.
///
/// The current context is listed first and tagged `[current]`. Returns no
/// candidates if the kubeconfig cannot be read.
pub fn context_value_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|input: &OsStr| -> Vec<CompletionCandidate> {
        let store = match ConfigStore::read() {
            Ok(store) => store,
            Err(_) => return Vec::new(),
        };

        // Convert OsStr to &str with trimmed whitespace
        let input = input.to_string_lossy();
        context_candidates(&store, input.trim())
    })
}

/// Completion candidates for contexts in `store` starting with `prefix`.
pub fn context_candidates(store: &ConfigStore, prefix: &str) -> Vec<CompletionCandidate> {
    let kubeconfig = store.kubeconfig();
    let current_context = kubeconfig.current_context.as_deref();

    let mut completions = Vec::new();
    for named_context in &kubeconfig.contexts {
        let context_name = named_context.name.as_str();
        if !context_name.starts_with(prefix) {
            continue;
        }

        let is_current = current_context == Some(context_name);
        let mut details = Vec::new();
        if is_current {
            details.push(String::from("[current]"));
        }
        if let Some(ctx) = &named_context.context {
            details.push(format!("cluster={}", ctx.cluster));
            if let Some(namespace) = &ctx.namespace {
                details.push(format!("namespace={namespace}"));
            }
        }

        let mut candidate = CompletionCandidate::new(context_name);
        if !details.is_empty() {
            candidate = candidate.help(Some(details.join(" ").into()));
        }

        if is_current {
            completions.insert(0, candidate.display_order(Some(0)));
        } else {
            completions.push(candidate);
        }
    }

    completions
}
