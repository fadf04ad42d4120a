//! Shared fixtures for dispatcher integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dispatcher::core::{ResultPaths, RetryPolicy, TemplatePromptSource};
use dispatcher::services::{DummyClient, LockSettings, ResultStore};
use dispatcher::{DispatchContext, DispatchContextBuilder, ProviderClient};
use shared::ProviderId;

pub const SPECIES: &str = "human";
pub const ATLAS: &str = "aal";
pub const TEMPLATE: &str = "default";

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub fn result_paths(root: &Path) -> ResultPaths {
    ResultPaths::new(root, SPECIES, ATLAS, TEMPLATE)
}

/// Lock budget with short waits so contention tests stay fast
pub fn fast_locks() -> LockSettings {
    LockSettings {
        attempts: 3,
        base_delay: Duration::from_millis(10),
        stale_after: None,
    }
}

/// Context builder with default prompts and a fast-lock store
pub fn builder(root: &Path) -> DispatchContextBuilder {
    DispatchContext::builder(result_paths(root), Arc::new(TemplatePromptSource::with_defaults(SPECIES)))
        .store(ResultStore::new(fast_locks()))
}

/// Context serving only the offline dummy model
pub fn dummy_context(root: &Path) -> Arc<DispatchContext> {
    Arc::new(
        builder(root)
            .provider(Arc::new(DummyClient), RetryPolicy::new(ProviderId::Dummy, 1, Duration::ZERO))
            .build(),
    )
}

/// Context with `client` registered under its own provider id
pub fn context_with(root: &Path, client: Arc<dyn ProviderClient>, retry: RetryPolicy) -> Arc<DispatchContext> {
    Arc::new(builder(root).provider(client, retry).build())
}
