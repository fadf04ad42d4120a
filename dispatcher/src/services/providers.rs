//! HTTP clients for the supported text-generation providers
//!
//! Every client performs exactly one request per `generate` call. Status codes
//! are mapped onto [`ApiFailure`] so the retry policy can treat all providers
//! the same way.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use shared::{run_debug, ApiFailure, ProviderConfig, ProviderId};
use crate::error::{DispatchError, DispatchResult};
use crate::traits::ProviderClient;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const TOGETHER_BASE_URL: &str = "https://api.together.xyz/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const CLAUDE_MAX_TOKENS: u32 = 1024;

/// Send a JSON request and return the decoded body of a successful response
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, ApiFailure> {
    let response = request
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|e| ApiFailure::NetworkError(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(ApiFailure::from_status(status.as_u16(), detail));
    }

    response
        .json()
        .await
        .map_err(|e| ApiFailure::MalformedResponse(format!("Failed to parse response: {}", e.without_url())))
}

fn text_at<'a>(body: &'a Value, pointer: &str) -> Result<&'a str, ApiFailure> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiFailure::MalformedResponse(format!("No content at {pointer} in response")))
}

/// Client for OpenAI-style `/chat/completions` endpoints (OpenAI and Together)
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    provider: ProviderId,
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ChatCompletionsClient {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(ProviderId::OpenAI, api_key, OPENAI_BASE_URL)
    }

    pub fn together(api_key: impl Into<String>) -> Self {
        Self::new(ProviderId::Together, api_key, TOGETHER_BASE_URL)
    }

    pub fn new(provider: ProviderId, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderClient for ChatCompletionsClient {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ApiFailure> {
        let body = json!({
            "model": model_id,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = send_json(
            self.http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        Ok(text_at(&response, "/choices/0/message/content")?.trim().to_string())
    }
}

/// Anthropic Messages API client
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderClient for ClaudeClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Claude
    }

    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ApiFailure> {
        let body = json!({
            "model": model_id,
            "max_tokens": CLAUDE_MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = send_json(
            self.http
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body),
        )
        .await?;

        Ok(text_at(&response, "/content/0/text")?.trim().to_string())
    }
}

/// Google Gemini `generateContent` client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ApiFailure> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = send_json(
            self.http
                .post(format!("{}/models/{}:generateContent", self.base_url, model_id))
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        Ok(text_at(&response, "/candidates/0/content/parts/0/text")?.to_string())
    }
}

/// Functions the offline model picks from
pub const DUMMY_FUNCTIONS: [&str; 15] = [
    "sensory processing",
    "motor control",
    "memory formation",
    "emotional regulation",
    "language processing",
    "attention control",
    "decision making",
    "spatial navigation",
    "auditory processing",
    "visual processing",
    "pain perception",
    "reward processing",
    "fear response",
    "learning",
    "cognition",
];

pub const DUMMY_FALLBACK_RESPONSE: &str = "This is a dummy response for testing purposes.";

/// Offline model for exercising the pipeline without network access or keys
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyClient;

impl DummyClient {
    /// Answer shaped after what the prompt asks for; never fails
    pub fn respond(prompt: &str) -> String {
        let prompt = prompt.to_lowercase();
        let mut rng = rand::thread_rng();

        if prompt.contains("probability") {
            format!("{:.2}", rng.gen_range(0.1..=0.9))
        } else if prompt.contains("top 5 functions") {
            let picked: Vec<&str> = DUMMY_FUNCTIONS.choose_multiple(&mut rng, 5).copied().collect();
            format!("[{}]", picked.join(", "))
        } else {
            DUMMY_FALLBACK_RESPONSE.to_string()
        }
    }
}

#[async_trait]
impl ProviderClient for DummyClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Dummy
    }

    async fn generate(&self, _model_id: &str, prompt: &str) -> Result<String, ApiFailure> {
        Ok(Self::respond(prompt))
    }
}

/// Configured client for one provider
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAI(ChatCompletionsClient),
    Claude(ClaudeClient),
    Gemini(GeminiClient),
    Together(ChatCompletionsClient),
    Dummy(DummyClient),
}

impl Provider {
    /// Build the client for `provider`; providers whose config requires a client need a key
    pub fn connect(provider: ProviderId, config: &ProviderConfig, api_key: Option<String>) -> DispatchResult<Self> {
        if !config.requires_client {
            return Ok(Provider::Dummy(DummyClient));
        }

        let api_key = api_key.filter(|key| !key.is_empty()).ok_or_else(|| DispatchError::MissingCredential {
            provider,
            var: provider.api_key_var().unwrap_or_default().to_string(),
        })?;

        run_debug!("Initialized {} client", provider);
        Ok(match provider {
            ProviderId::OpenAI => Provider::OpenAI(ChatCompletionsClient::openai(api_key)),
            ProviderId::Claude => Provider::Claude(ClaudeClient::new(api_key)),
            ProviderId::Gemini => Provider::Gemini(GeminiClient::new(api_key)),
            ProviderId::Together => Provider::Together(ChatCompletionsClient::together(api_key)),
            ProviderId::Dummy => Provider::Dummy(DummyClient),
        })
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, Provider::Dummy(_))
    }
}

#[async_trait]
impl ProviderClient for Provider {
    fn provider(&self) -> ProviderId {
        match self {
            Provider::OpenAI(client) | Provider::Together(client) => client.provider(),
            Provider::Claude(client) => client.provider(),
            Provider::Gemini(client) => client.provider(),
            Provider::Dummy(client) => client.provider(),
        }
    }

    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ApiFailure> {
        match self {
            Provider::OpenAI(client) | Provider::Together(client) => client.generate(model_id, prompt).await,
            Provider::Claude(client) => client.generate(model_id, prompt).await,
            Provider::Gemini(client) => client.generate(model_id, prompt).await,
            Provider::Dummy(client) => client.generate(model_id, prompt).await,
        }
    }
}
