//! Text embeddings for cleaned function lists

use rand::Rng;
use serde_json::{json, Value};

use shared::{ApiFailure, ProviderId};
use crate::core::RetryPolicy;
use crate::error::DispatchResult;
use crate::services::providers::{send_json, OPENAI_BASE_URL};

pub const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Width of the random vectors produced for the dummy model
pub const DUMMY_EMBEDDING_DIMENSIONS: usize = 3073;

/// OpenAI `/embeddings` endpoint client
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: OPENAI_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One embedding request, no retry
    pub async fn embed_once(&self, text: &str) -> Result<Vec<f64>, ApiFailure> {
        let response = send_json(
            self.http
                .post(format!("{}/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({ "input": text, "model": self.model })),
        )
        .await?;

        response
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiFailure::MalformedResponse("No embedding in response".to_string()))?
            .iter()
            .map(|value| {
                value
                    .as_f64()
                    .ok_or_else(|| ApiFailure::MalformedResponse(format!("Non-numeric embedding value {value}")))
            })
            .collect()
    }
}

/// Source of embedding vectors for one model's output
#[derive(Debug, Clone)]
pub enum EmbeddingClient {
    OpenAI { client: OpenAiEmbeddings, retry: RetryPolicy },
    Dummy { dimensions: usize },
}

impl EmbeddingClient {
    pub fn dummy() -> Self {
        EmbeddingClient::Dummy { dimensions: DUMMY_EMBEDDING_DIMENSIONS }
    }

    pub fn openai(client: OpenAiEmbeddings, retry: RetryPolicy) -> Self {
        EmbeddingClient::OpenAI { client, retry }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            EmbeddingClient::OpenAI { .. } => ProviderId::OpenAI,
            EmbeddingClient::Dummy { .. } => ProviderId::Dummy,
        }
    }

    /// Embed `text`; remote requests go through the retry policy
    pub async fn embed(&self, text: &str) -> DispatchResult<Vec<f64>> {
        match self {
            EmbeddingClient::OpenAI { client, retry } => retry.retry(|| client.embed_once(text)).await,
            EmbeddingClient::Dummy { dimensions } => Ok(random_embedding(*dimensions)),
        }
    }
}

/// Uniform random vector in `[-1, 1]`
pub fn random_embedding(dimensions: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..dimensions).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}
