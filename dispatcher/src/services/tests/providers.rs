//! Tests for provider clients against a mock HTTP server

use mockito::{Matcher, Server};
use serde_json::json;

use shared::{ApiFailure, ProviderConfig, ProviderId};
use crate::error::DispatchError;
use crate::services::embeddings::{EmbeddingClient, OpenAiEmbeddings, DUMMY_EMBEDDING_DIMENSIONS};
use crate::services::providers::{
    ChatCompletionsClient, ClaudeClient, DummyClient, GeminiClient, Provider, DUMMY_FALLBACK_RESPONSE,
    DUMMY_FUNCTIONS,
};
use crate::core::RetryPolicy;
use crate::traits::ProviderClient;

#[tokio::test]
async fn test_openai_chat_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-openai")
        .match_body(Matcher::PartialJson(json!({ "model": "gpt-4o-mini" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "choices": [{ "message": { "content": "  [a, b, c, d, e]\n" } }] }).to_string())
        .create_async()
        .await;

    let client = ChatCompletionsClient::openai("test-openai").with_base_url(server.url());
    let text = client.generate("gpt-4o-mini", "list functions").await.unwrap();

    assert_eq!(text, "[a, b, c, d, e]");
    assert_eq!(client.provider(), ProviderId::OpenAI);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_claude_messages() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/messages")
        .match_header("x-api-key", "test-claude")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({ "max_tokens": 1024 })))
        .with_status(200)
        .with_body(json!({ "content": [{ "type": "text", "text": "0.42" }] }).to_string())
        .create_async()
        .await;

    let client = ClaudeClient::new("test-claude").with_base_url(server.url());
    assert_eq!(client.generate("claude-3-7-sonnet-latest", "p").await.unwrap(), "0.42");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_generate_content() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.0-flash:generateContent")
        .match_header("x-goog-api-key", "test-gemini")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_body(json!({ "candidates": [{ "content": { "parts": [{ "text": "0.8" }] } }] }).to_string())
        .create_async()
        .await;

    let client = GeminiClient::new("test-gemini").with_base_url(server.url());
    assert_eq!(client.generate("gemini-2.0-flash", "p").await.unwrap(), "0.8");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_codes_map_to_failures() {
    let cases = [
        (401, ApiFailure::AuthenticationFailed),
        (429, ApiFailure::RateLimitExceeded),
        (503, ApiFailure::ServiceUnavailable),
    ];

    for (status, expected) in cases {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(status)
            .with_body("{}")
            .create_async()
            .await;

        let client = ChatCompletionsClient::together("key").with_base_url(server.url());
        let failure = client.generate("llama", "p").await.unwrap_err();
        assert_eq!(failure, expected, "status {status}");
    }
}

#[tokio::test]
async fn test_server_error_keeps_detail() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let client = ChatCompletionsClient::openai("key").with_base_url(server.url());
    match client.generate("gpt-4o-mini", "p").await.unwrap_err() {
        ApiFailure::ServerError(detail) => assert!(detail.contains("upstream exploded")),
        other => panic!("unexpected failure: {other}"),
    }
}

#[tokio::test]
async fn test_missing_content_is_malformed() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(json!({ "choices": [] }).to_string())
        .create_async()
        .await;

    let client = ChatCompletionsClient::openai("key").with_base_url(server.url());
    assert!(matches!(
        client.generate("gpt-4o-mini", "p").await,
        Err(ApiFailure::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let client = ChatCompletionsClient::openai("key").with_base_url("http://127.0.0.1:9");
    assert!(matches!(
        client.generate("gpt-4o-mini", "p").await,
        Err(ApiFailure::NetworkError(_))
    ));
}

#[tokio::test]
async fn test_transport_errors_never_carry_the_api_key() {
    let gemini = GeminiClient::new("SECRET-GEMINI-KEY").with_base_url("http://127.0.0.1:1");
    match gemini.generate("gemini-2.0-flash", "p").await.unwrap_err() {
        ApiFailure::NetworkError(detail) => {
            assert!(!detail.contains("SECRET-GEMINI-KEY"), "{detail}");
        }
        other => panic!("unexpected failure: {other}"),
    }

    let openai = ChatCompletionsClient::openai("SECRET-OPENAI-KEY").with_base_url("http://127.0.0.1:1");
    let failure = openai.generate("gpt-4o-mini", "p").await.unwrap_err();
    assert!(!failure.to_string().contains("SECRET-OPENAI-KEY"));
}

#[tokio::test]
async fn test_dummy_responses() {
    let dummy = DummyClient;

    let probability = dummy.generate("dummy", "Estimate the probability that ...").await.unwrap();
    let value: f64 = probability.parse().unwrap();
    assert!((0.1..=0.9).contains(&value));
    assert_eq!(probability.split('.').nth(1).map(str::len), Some(2));

    let listed = dummy.generate("dummy", "List the top 5 functions of V1").await.unwrap();
    let inner = listed.trim_start_matches('[').trim_end_matches(']');
    let functions: Vec<&str> = inner.split(", ").collect();
    assert_eq!(functions.len(), 5);
    assert!(functions.iter().all(|f| DUMMY_FUNCTIONS.contains(f)));
    let mut distinct = functions.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 5);

    assert_eq!(dummy.generate("dummy", "hello").await.unwrap(), DUMMY_FALLBACK_RESPONSE);
}

#[test]
fn test_connect_requires_key() {
    let connect = |provider: ProviderId, key: Option<String>| {
        Provider::connect(provider, &ProviderConfig::defaults_for(provider), key)
    };

    let err = connect(ProviderId::Gemini, None).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::MissingCredential { provider: ProviderId::Gemini, ref var } if var == "GEMINI_API_KEY"
    ));
    assert!(connect(ProviderId::Claude, Some(String::new())).is_err());

    let dummy = connect(ProviderId::Dummy, None).unwrap();
    assert!(dummy.is_dummy());
    let together = connect(ProviderId::Together, Some("k".to_string())).unwrap();
    assert_eq!(together.provider(), ProviderId::Together);
}

#[tokio::test]
async fn test_openai_embeddings() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/embeddings")
        .match_body(Matcher::PartialJson(json!({ "model": "text-embedding-3-large", "input": "a, b" })))
        .with_status(200)
        .with_body(json!({ "data": [{ "embedding": [0.1, -0.2, 0.3] }] }).to_string())
        .create_async()
        .await;

    let client = EmbeddingClient::openai(
        OpenAiEmbeddings::new("key").with_base_url(server.url()),
        RetryPolicy::new(ProviderId::OpenAI, 1, std::time::Duration::ZERO),
    );
    assert_eq!(client.embed("a, b").await.unwrap(), vec![0.1, -0.2, 0.3]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_dummy_embeddings() {
    let embedding = EmbeddingClient::dummy().embed("anything").await.unwrap();
    assert_eq!(embedding.len(), DUMMY_EMBEDDING_DIMENSIONS);
    assert!(embedding.iter().all(|v| (-1.0..=1.0).contains(v)));
}
