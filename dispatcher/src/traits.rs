//! Dispatcher trait definitions for dependency injection

use async_trait::async_trait;

use shared::{ApiFailure, ProviderId, Task};
use crate::error::DispatchResult;
use crate::types::RunReport;

/// Single-request text generation against one provider
///
/// Implementations perform exactly one network operation per call and never
/// retry internally; retrying is the job of [`crate::core::RetryPolicy`].
#[mockall::automock]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider this client talks to
    fn provider(&self) -> ProviderId;

    /// Generate a completion for `prompt` with the provider-specific model id
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ApiFailure>;
}

/// API key source abstraction
#[mockall::automock]
#[async_trait]
pub trait ApiKeySource: Send + Sync {
    /// API key for a provider, if one is configured
    async fn get_api_key(&self, provider: ProviderId) -> Option<String>;
}

/// Renders the prompt text for a task
#[mockall::automock]
pub trait PromptSource: Send + Sync {
    fn render(&self, task: &Task) -> DispatchResult<String>;
}

/// Downstream work that may only run after a complete batch
#[mockall::automock]
#[async_trait]
pub trait PostProcessor: Send + Sync {
    async fn process(&self, report: &RunReport) -> DispatchResult<()>;
}
