//! Model catalog and per-provider retry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{SharedError, SharedResult};
use crate::types::ProviderId;

/// Pricing tier of a catalog model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Paid,
    Free,
    Dummy,
}

/// A model name as used on the command line, bound to its provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModelSpec {
    pub name: &'static str,
    pub provider: ProviderId,
    pub model_id: &'static str,
    pub category: ModelCategory,
}

/// All models the dispatcher knows how to reach
pub const MODEL_CATALOG: &[ModelSpec] = &[
    ModelSpec { name: "openai", provider: ProviderId::OpenAI, model_id: "gpt-4o-mini", category: ModelCategory::Paid },
    ModelSpec { name: "claude", provider: ProviderId::Claude, model_id: "claude-3-7-sonnet-latest", category: ModelCategory::Paid },
    ModelSpec { name: "gemini", provider: ProviderId::Gemini, model_id: "gemini-2.0-flash", category: ModelCategory::Paid },
    ModelSpec { name: "qwen", provider: ProviderId::Together, model_id: "Qwen/Qwen2.5-7B-Instruct-Turbo", category: ModelCategory::Paid },
    ModelSpec { name: "mistral", provider: ProviderId::Together, model_id: "mistralai/Mistral-7B-Instruct-v0.3", category: ModelCategory::Paid },
    ModelSpec { name: "llama", provider: ProviderId::Together, model_id: "meta-llama/Llama-3.3-70B-Instruct-Turbo", category: ModelCategory::Free },
    ModelSpec { name: "deepseek", provider: ProviderId::Together, model_id: "deepseek-ai/DeepSeek-R1-Distill-Llama-70B", category: ModelCategory::Free },
    ModelSpec { name: "dummy", provider: ProviderId::Dummy, model_id: "dummy-model-for-testing", category: ModelCategory::Dummy },
];

/// Functions scored by a probabilities run when none are given
pub const DEFAULT_FUNCTIONS: &[&str] = &[
    "spatial cognition",
    "rationality",
    "creativity",
    "metacognition",
    "consciousness",
    "anaesthesia",
    "coma",
];

/// Functions scored by the `test` workflow
pub const TEST_FUNCTIONS: &[&str] = &["spatial cognition", "consciousness"];

/// Look up a catalog model by name
pub fn find_model(name: &str) -> SharedResult<&'static ModelSpec> {
    MODEL_CATALOG
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| SharedError::UnknownModel { name: name.to_string() })
}

/// Resolve a model selector: `all`, `all-excl-dummy`, `paid`, `free`, `dummy`,
/// or a comma-separated list of model names
pub fn select_models(selector: &str) -> SharedResult<Vec<&'static ModelSpec>> {
    let selected: Vec<&'static ModelSpec> = match selector.trim() {
        "all" => MODEL_CATALOG.iter().collect(),
        "all-excl-dummy" => MODEL_CATALOG
            .iter()
            .filter(|spec| spec.category != ModelCategory::Dummy)
            .collect(),
        "paid" => by_category(ModelCategory::Paid),
        "free" => by_category(ModelCategory::Free),
        "dummy" => by_category(ModelCategory::Dummy),
        list => list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(find_model)
            .collect::<SharedResult<Vec<_>>>()?,
    };

    if selected.is_empty() {
        return Err(SharedError::EmptySelection { field: "models".to_string() });
    }
    Ok(selected)
}

fn by_category(category: ModelCategory) -> Vec<&'static ModelSpec> {
    MODEL_CATALOG.iter().filter(|spec| spec.category == category).collect()
}

/// Retry budget and client requirements for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub max_retries: u32,
    pub initial_delay_seconds: f64,
    /// Whether calls go through a keyed remote client
    pub requires_client: bool,
}

impl ProviderConfig {
    /// Observed defaults: 5 retries / 2s generally, 7 / 5s for Together's tighter limits
    pub fn defaults_for(provider: ProviderId) -> Self {
        match provider {
            ProviderId::Together => Self {
                max_retries: 7,
                initial_delay_seconds: 5.0,
                requires_client: true,
            },
            ProviderId::Dummy => Self {
                max_retries: 1,
                initial_delay_seconds: 0.0,
                requires_client: false,
            },
            _ => Self {
                max_retries: 5,
                initial_delay_seconds: 2.0,
                requires_client: true,
            },
        }
    }

    /// Load provider settings from environment variables
    ///
    /// Environment variables:
    /// - `<PROVIDER>_MAX_RETRIES`: attempts before giving up (>= 1)
    /// - `<PROVIDER>_INITIAL_DELAY_SECS`: first backoff delay in seconds (>= 0)
    pub fn from_env(provider: ProviderId) -> SharedResult<Self> {
        Self::from_lookup(provider, |key| std::env::var(key).ok())
    }

    /// Same as [`ProviderConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(provider: ProviderId, lookup: F) -> SharedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::defaults_for(provider);
        let prefix = provider.env_prefix();

        let retries_key = format!("{prefix}_MAX_RETRIES");
        if let Some(raw) = lookup(&retries_key) {
            let value: u32 = raw.trim().parse().map_err(|_| SharedError::InvalidConfig {
                field: retries_key.clone(),
                value: raw.clone(),
            })?;
            if value == 0 {
                return Err(SharedError::InvalidConfig { field: retries_key, value: raw });
            }
            config.max_retries = value;
        }

        let delay_key = format!("{prefix}_INITIAL_DELAY_SECS");
        if let Some(raw) = lookup(&delay_key) {
            let value: f64 = raw.trim().parse().map_err(|_| SharedError::InvalidConfig {
                field: delay_key.clone(),
                value: raw.clone(),
            })?;
            if !value.is_finite() || value < 0.0 || Duration::try_from_secs_f64(value).is_err() {
                return Err(SharedError::InvalidConfig { field: delay_key, value: raw });
            }
            config.initial_delay_seconds = value;
        }

        Ok(config)
    }

    /// First backoff delay; out-of-range values saturate instead of panicking
    pub fn initial_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.initial_delay_seconds).unwrap_or(if self.initial_delay_seconds > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        })
    }
}
