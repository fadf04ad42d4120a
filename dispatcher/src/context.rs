//! Immutable per-run dependencies shared by every worker
//!
//! A [`DispatchContext`] is assembled once before dispatch and handed to the
//! pool behind an `Arc`. Nothing in it is mutated while tasks run; the result
//! store is the only component with internal synchronization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use shared::{find_model, run_debug, ModelSpec, ProviderConfig, ProviderId, Task};
use crate::core::{ResultPaths, RetryPolicy};
use crate::error::{DispatchError, DispatchResult};
use crate::services::{EmbeddingClient, OpenAiEmbeddings, Provider, ResultStore};
use crate::traits::{PromptSource, ProviderClient};

/// A provider client together with the retry budget applied to its calls
#[derive(Clone)]
pub struct ProviderHandle {
    client: Arc<dyn ProviderClient>,
    retry: RetryPolicy,
}

impl ProviderHandle {
    pub fn new(client: Arc<dyn ProviderClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Generate through the retry policy; the dummy provider is called directly
    pub async fn generate(&self, model_id: &str, prompt: &str) -> DispatchResult<String> {
        if self.client.provider() == ProviderId::Dummy {
            return self.client.generate(model_id, prompt).await.map_err(|reason| DispatchError::Provider {
                provider: ProviderId::Dummy,
                reason,
            });
        }
        self.retry.retry(|| self.client.generate(model_id, prompt)).await
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.client.provider())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Clients, policies and output locations for one run
pub struct DispatchContext {
    providers: HashMap<ProviderId, ProviderHandle>,
    embeddings: Option<EmbeddingClient>,
    prompts: Arc<dyn PromptSource>,
    store: ResultStore,
    paths: ResultPaths,
}

impl DispatchContext {
    pub fn builder(paths: ResultPaths, prompts: Arc<dyn PromptSource>) -> DispatchContextBuilder {
        DispatchContextBuilder {
            providers: HashMap::new(),
            embeddings: None,
            prompts,
            store: ResultStore::default(),
            paths,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn paths(&self) -> &ResultPaths {
        &self.paths
    }

    pub fn prompts(&self) -> &dyn PromptSource {
        self.prompts.as_ref()
    }

    /// Catalog entry for the task's model
    pub fn model(&self, task: &Task) -> DispatchResult<&'static ModelSpec> {
        Ok(find_model(&task.model)?)
    }

    pub fn provider(&self, provider: ProviderId) -> DispatchResult<&ProviderHandle> {
        self.providers
            .get(&provider)
            .ok_or(DispatchError::MissingProviderConfig { provider })
    }

    /// Embedding source for a model's output: random vectors for the dummy model,
    /// the configured remote client otherwise
    pub fn embeddings_for(&self, model: &ModelSpec) -> DispatchResult<EmbeddingClient> {
        if model.provider == ProviderId::Dummy {
            return Ok(EmbeddingClient::dummy());
        }
        self.embeddings
            .clone()
            .ok_or(DispatchError::MissingProviderConfig { provider: ProviderId::OpenAI })
    }
}

/// Assembles a [`DispatchContext`]
pub struct DispatchContextBuilder {
    providers: HashMap<ProviderId, ProviderHandle>,
    embeddings: Option<EmbeddingClient>,
    prompts: Arc<dyn PromptSource>,
    store: ResultStore,
    paths: ResultPaths,
}

impl DispatchContextBuilder {
    pub fn provider(mut self, client: Arc<dyn ProviderClient>, retry: RetryPolicy) -> Self {
        let provider = client.provider();
        run_debug!("Registered {} client ({} attempts)", provider, retry.max_retries());
        self.providers.insert(provider, ProviderHandle::new(client, retry));
        self
    }

    pub fn embeddings(mut self, embeddings: EmbeddingClient) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn store(mut self, store: ResultStore) -> Self {
        self.store = store;
        self
    }

    /// Connect a client for every provider in `providers` using `keys`
    ///
    /// Retry budgets come from [`ProviderConfig::from_env`]. When
    /// `with_embeddings` is set and OpenAI has a key, an OpenAI embedding
    /// client is configured as well.
    pub fn connect(
        mut self,
        providers: impl IntoIterator<Item = ProviderId>,
        keys: &HashMap<ProviderId, String>,
        with_embeddings: bool,
    ) -> DispatchResult<Self> {
        for provider in providers {
            let config = ProviderConfig::from_env(provider)?;
            let client = Provider::connect(provider, &config, keys.get(&provider).cloned())?;
            self = self.provider(Arc::new(client), RetryPolicy::from_config(provider, &config));
        }

        if with_embeddings {
            if let Some(key) = keys.get(&ProviderId::OpenAI) {
                let config = ProviderConfig::from_env(ProviderId::OpenAI)?;
                self = self.embeddings(EmbeddingClient::openai(
                    OpenAiEmbeddings::new(key.clone()),
                    RetryPolicy::from_config(ProviderId::OpenAI, &config),
                ));
            }
        }

        Ok(self)
    }

    pub fn build(self) -> DispatchContext {
        DispatchContext {
            providers: self.providers,
            embeddings: self.embeddings,
            prompts: self.prompts,
            store: self.store,
            paths: self.paths,
        }
    }
}
