//! Environment-based API key management
//!
//! Keys are looked up in the process environment first, then in a `.env`
//! file (current directory or its parents) read once at construction. The
//! `.env` file is parsed without modifying the process environment.
//!
//! ## Keys
//! - `OPENAI_API_KEY`: OpenAI chat models and embeddings
//! - `CLAUDE_API_KEY`: Anthropic Claude
//! - `GEMINI_API_KEY`: Google Gemini
//! - `TOGETHERAI_API_KEY`: Together-hosted open models

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use async_trait::async_trait;

use shared::{run_error, run_info, ProviderConfig, ProviderId};
use crate::error::{DispatchError, DispatchResult};
use crate::traits::ApiKeySource;

/// API key source backed by environment variables and an optional `.env` file
#[derive(Debug, Clone, Default)]
pub struct EnvApiKeySource {
    file_values: HashMap<String, String>,
}

impl EnvApiKeySource {
    /// Read `.env` from the current directory or a parent, if one exists
    pub fn load() -> Self {
        let file_values = match dotenvy::dotenv_iter() {
            Ok(entries) => entries.filter_map(Result::ok).collect(),
            Err(_) => HashMap::new(),
        };
        Self { file_values }
    }

    /// Read an explicit env file
    pub fn from_path(path: &Path) -> DispatchResult<Self> {
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| DispatchError::config(format!("Error loading {}: {e}", path.display())))?;
        let file_values = entries
            .collect::<Result<HashMap<_, _>, _>>()
            .map_err(|e| DispatchError::config(format!("Error parsing {}: {e}", path.display())))?;
        Ok(Self { file_values })
    }

    fn lookup(&self, var: &str) -> Option<String> {
        std::env::var(var)
            .ok()
            .or_else(|| self.file_values.get(var).cloned())
            .filter(|value| !value.trim().is_empty())
    }
}

#[async_trait]
impl ApiKeySource for EnvApiKeySource {
    async fn get_api_key(&self, provider: ProviderId) -> Option<String> {
        provider.api_key_var().and_then(|var| self.lookup(var))
    }
}

/// Collect the key of every provider that needs one, failing on the first that is absent
pub async fn resolve_credentials<S>(
    source: &S,
    providers: impl IntoIterator<Item = ProviderId>,
) -> DispatchResult<HashMap<ProviderId, String>>
where
    S: ApiKeySource + ?Sized,
{
    let mut keys = HashMap::new();
    let required: BTreeSet<ProviderId> = providers.into_iter().collect();

    for provider in required {
        if !ProviderConfig::defaults_for(provider).requires_client {
            continue;
        }
        let var = provider.api_key_var().unwrap_or_default();
        match source.get_api_key(provider).await {
            Some(key) => {
                run_info!("Found API key for {}", provider);
                keys.insert(provider, key);
            }
            None => {
                run_error!("No API key found for {} ({})", provider, var);
                return Err(DispatchError::MissingCredential {
                    provider,
                    var: var.to_string(),
                });
            }
        }
    }

    Ok(keys)
}
