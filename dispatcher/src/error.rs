//! Dispatcher error types

use std::path::PathBuf;
use thiserror::Error;

use shared::{ApiFailure, ProviderId, SharedError};

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Dispatcher error types
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Provider request failed: {provider} - {reason}")]
    Provider { provider: ProviderId, reason: ApiFailure },

    #[error("Maximum retries ({attempts}) exceeded for {provider}. Last error: {last}")]
    RetriesExhausted {
        provider: ProviderId,
        attempts: u32,
        last: ApiFailure,
    },

    #[error("Could not get lock for {} after {attempts} attempts", path.display())]
    LockUnavailable { path: PathBuf, attempts: u32 },

    #[error("Missing API key for {provider} (set {var})")]
    MissingCredential { provider: ProviderId, var: String },

    #[error("No provider configuration for {provider}")]
    MissingProviderConfig { provider: ProviderId },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Prompt rendering failed: {message}")]
    Prompt { message: String },

    #[error("Run incomplete: {completed}/{total} tasks succeeded")]
    IncompleteBatch { completed: usize, total: usize },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl DispatchError {
    pub fn config(message: impl Into<String>) -> Self {
        DispatchError::Config { message: message.into() }
    }

    /// Fatal errors terminate the whole run instead of being recorded against one task
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::LockUnavailable { .. }
                | DispatchError::MissingCredential { .. }
                | DispatchError::MissingProviderConfig { .. }
                | DispatchError::Config { .. }
        )
    }

    /// Short machine-readable label used in task failure records
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Provider { reason, .. } => reason.kind(),
            DispatchError::RetriesExhausted { .. } => "retries_exhausted",
            DispatchError::LockUnavailable { .. } => "lock_unavailable",
            DispatchError::MissingCredential { .. } => "missing_credential",
            DispatchError::MissingProviderConfig { .. } => "missing_provider_config",
            DispatchError::Config { .. } => "config",
            DispatchError::Prompt { .. } => "prompt",
            DispatchError::IncompleteBatch { .. } => "incomplete_batch",
            DispatchError::Shared(_) => "shared",
            DispatchError::Io(_) => "io",
            DispatchError::Json(_) => "json",
            DispatchError::Join(_) => "join",
        }
    }
}
