//! OpenAI-compatible backend against a mock HTTP server.

use counsel_core::{ChatMessage, EmbeddingBackend, Error, GenerationBackend, InferenceBackend};
use counsel_inference::openai::{OpenAIBackend, OpenAIConfig};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> OpenAIConfig {
    OpenAIConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        embed_model: "test-embed".to_string(),
        gen_model: "test-gen".to_string(),
        embed_dimension: 3,
        temperature: 0.7,
        max_tokens: None,
        embed_batch_size: 64,
        timeout_seconds: 10,
    }
}

#[tokio::test]
async fn test_embeddings_sorted_by_index() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"embedding": [0.0, 1.0, 0.0], "index": 1},
                {"embedding": [1.0, 0.0, 0.0], "index": 0}
            ],
            "model": "test-embed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    let vectors = backend
        .embed_texts(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors[0].as_slice(), &[1.0, 0.0, 0.0]);
    assert_eq!(vectors[1].as_slice(), &[0.0, 1.0, 0.0]);
}

#[tokio::test]
async fn test_embeddings_split_into_request_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_json(json!({
            "model": "test-embed",
            "input": ["a", "b"],
            "encoding_format": "float"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"embedding": [1.0, 0.0, 0.0], "index": 0},
                {"embedding": [0.0, 1.0, 0.0], "index": 1}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_json(json!({
            "model": "test-embed",
            "input": ["c"],
            "encoding_format": "float"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.0, 0.0, 1.0], "index": 0}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(OpenAIConfig {
        embed_batch_size: 2,
        ..config(&server)
    })
    .unwrap();

    let vectors = backend
        .embed_texts(&["a".to_string(), "b".to_string(), "c".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[2].as_slice(), &[0.0, 0.0, 1.0]);
}

#[tokio::test]
async fn test_empty_input_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    assert!(backend.embed_texts(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dimension_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0, 0.0], "index": 0}]
        })))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    let err = backend.embed_texts(&["x".to_string()]).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(ref m) if m.contains("dimension")));
}

#[tokio::test]
async fn test_embedding_error_carries_upstream_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "overloaded", "type": "server_error"}
        })))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    let err = backend.embed_texts(&["x".to_string()]).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(ref m) if m.contains("overloaded")));
}

#[tokio::test]
async fn test_chat_sends_messages_and_temperature() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "test-gen",
            "temperature": 0.7,
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are a counselor."},
                {"role": "user", "content": "I feel anxious."},
                {"role": "assistant", "content": "Tell me more."},
                {"role": "user", "content": "About exams."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Exams can be stressful."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    let reply = backend
        .chat(&[
            ChatMessage::system("You are a counselor."),
            ChatMessage::user("I feel anxious."),
            ChatMessage::assistant("Tell me more."),
            ChatMessage::user("About exams."),
        ])
        .await
        .unwrap();

    assert_eq!(reply, "Exams can be stressful.");
}

#[tokio::test]
async fn test_chat_without_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    assert!(matches!(
        backend.generate("hello").await,
        Err(Error::Inference(_))
    ));
}

#[tokio::test]
async fn test_chat_rate_limit_maps_to_inference_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "slow down", "type": "rate_limit_error"}
        })))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    let err = backend.generate("hello").await.unwrap_err();
    assert!(matches!(err, Error::Inference(ref m) if m.contains("Rate limit") && m.contains("slow down")));
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(config(&server)).unwrap();
    assert!(backend.health_check().await.unwrap());

    let down = OpenAIBackend::new(OpenAIConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..config(&server)
    })
    .unwrap();
    assert!(!down.health_check().await.unwrap());
}
