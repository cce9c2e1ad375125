use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use counsel_core::{
    defaults, ChatMessage, EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result,
    Vector,
};

use super::error::{from_response, Endpoint};
use super::types::{CompletionBody, CompletionReply, EmbedBody, EmbedReply};

/// Settings for an OpenAI-compatible model server.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL including any version prefix, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer key. Local servers usually need none.
    pub api_key: Option<String>,
    pub embed_model: String,
    pub gen_model: String,
    /// Vector length the embedding model must return.
    pub embed_dimension: usize,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Texts per `/embeddings` request.
    pub embed_batch_size: usize,
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_BASE_URL.to_string(),
            api_key: None,
            embed_model: defaults::EMBED_MODEL.to_string(),
            gen_model: defaults::GEN_MODEL.to_string(),
            embed_dimension: defaults::EMBED_DIMENSION,
            temperature: defaults::GEN_TEMPERATURE,
            max_tokens: None,
            embed_batch_size: defaults::EMBED_REQUEST_SIZE,
            timeout_seconds: defaults::INFERENCE_TIMEOUT_SECS,
        }
    }
}

fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl OpenAIConfig {
    /// `OPENAI_*` variables over the defaults.
    pub fn from_env() -> Self {
        let fallback = Self::default();
        Self {
            base_url: env_parsed("OPENAI_BASE_URL").unwrap_or(fallback.base_url),
            api_key: env_parsed::<String>("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            embed_model: env_parsed("OPENAI_EMBED_MODEL").unwrap_or(fallback.embed_model),
            gen_model: env_parsed("OPENAI_GEN_MODEL").unwrap_or(fallback.gen_model),
            embed_dimension: env_parsed("OPENAI_EMBED_DIM").unwrap_or(fallback.embed_dimension),
            temperature: env_parsed("OPENAI_TEMPERATURE").unwrap_or(fallback.temperature),
            max_tokens: env_parsed("OPENAI_MAX_TOKENS"),
            embed_batch_size: fallback.embed_batch_size,
            timeout_seconds: env_parsed("OPENAI_TIMEOUT").unwrap_or(fallback.timeout_seconds),
        }
    }
}

/// Embeddings and chat completions from one OpenAI-compatible server.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;

        info!(
            subsystem = "inference",
            component = "openai",
            url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            embed_dimension = config.embed_dimension,
            "Model server configured"
        );
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// POST a JSON body and decode a JSON reply, mapping failures per endpoint.
    async fn post_json<B, R>(&self, endpoint: Endpoint, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let path = match endpoint {
            Endpoint::Embeddings => "/embeddings",
            Endpoint::ChatCompletions => "/chat/completions",
        };
        let fail = |detail: String| match endpoint {
            Endpoint::Embeddings => Error::Embedding(detail),
            Endpoint::ChatCompletions => Error::Inference(detail),
        };

        let response = self
            .authorized(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| fail(format!("{path} unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(from_response(endpoint, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| fail(format!("{path} returned malformed JSON: {e}")))
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let reply: EmbedReply = self
            .post_json(
                Endpoint::Embeddings,
                &EmbedBody {
                    model: &self.config.embed_model,
                    input: texts,
                    encoding_format: "float",
                },
            )
            .await?;

        if reply.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Sent {} texts but received {} embeddings",
                texts.len(),
                reply.data.len()
            )));
        }

        let mut data = reply.data;
        data.sort_unstable_by_key(|d| d.index);
        let expected = self.config.embed_dimension;
        data.into_iter()
            .map(|d| match d.embedding.len() {
                n if n == expected => Ok(Vector::from(d.embedding)),
                n => Err(Error::Embedding(format!(
                    "Model returned dimension {n}, expected {expected}"
                ))),
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = self.config.embed_batch_size.max(1);
        debug!(
            subsystem = "inference",
            op = "embed",
            input_count = texts.len(),
            requests = texts.len().div_ceil(batch_size),
            "Embedding texts"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(self.embed_request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            subsystem = "inference",
            op = "chat",
            message_count = messages.len(),
            prompt_len = messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "Requesting completion"
        );

        let reply: CompletionReply = self
            .post_json(
                Endpoint::ChatCompletions,
                &CompletionBody {
                    model: &self.config.gen_model,
                    messages,
                    temperature: self.config.temperature,
                    max_tokens: self.config.max_tokens,
                    stream: false,
                },
            )
            .await?;

        let text = reply
            .into_text()
            .ok_or_else(|| Error::Inference("Completion had no text".to_string()))?;
        debug!(response_len = text.len(), "Completion received");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OpenAIBackend {
    /// `GET /models` answers 2xx. Transport errors count as unhealthy.
    async fn health_check(&self) -> Result<bool> {
        let result = self
            .authorized(self.client.get(self.url("/models")))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        let healthy = match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Model server health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Model server unreachable");
                false
            }
        };
        Ok(healthy)
    }
}
