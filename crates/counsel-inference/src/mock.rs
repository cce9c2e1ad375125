//! Mock backends for deterministic testing.
//!
//! Embeddings are hash-seeded unit vectors, so the same text always maps to
//! the same vector and different texts almost never collide. Generation
//! replies come from a script queue, then substring mappings, then a default.
//!
//! ## Usage
//!
//! ```rust
//! use counsel_inference::mock::MockInferenceBackend;
//! use counsel_core::GenerationBackend;
//!
//! # tokio_test_block(async {
//! let backend = MockInferenceBackend::new()
//!     .with_dimension(8)
//!     .with_response_mapping("weather", "It is sunny.");
//!
//! let reply = backend.generate("How is the weather?").await.unwrap();
//! assert_eq!(reply, "It is sunny.");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use counsel_core::{
    defaults, ChatMessage, EmbeddingBackend, EmotionLabel, Error, GenerationBackend,
    InferenceBackend, Result, Role, Vector,
};

use crate::emotion::{decode_frame, ClassifierStatus, EmotionClassifier, EmotionPrediction};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    script: Arc<Mutex<VecDeque<String>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    response_mappings: Vec<(String, String)>,
    default_response: String,
    latency_ms: u64,
    fail_embedding: bool,
    fail_generation: bool,
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    /// Embedded text, or the last user message of a chat call.
    pub input: String,
    /// Full message list for chat calls, empty for embeddings.
    pub messages: Vec<ChatMessage>,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: defaults::EMBED_DIMENSION,
            response_mappings: Vec::new(),
            default_response: "Mock response".to_string(),
            latency_ms: 0,
            fail_embedding: false,
            fail_generation: false,
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Reply used when nothing else matches.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Reply with `output` whenever the last user message contains `needle`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .response_mappings
            .push((needle.into(), output.into()));
        self
    }

    /// Queue replies returned in order before mappings apply.
    pub fn with_script<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.script).extend(replies.into_iter().map(Into::into));
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Make every embedding call fail.
    pub fn with_embedding_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_embedding = true;
        self
    }

    /// Make every generation call fail.
    pub fn with_generation_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_generation = true;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        lock(&self.call_log).clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        lock(&self.call_log).clear()
    }

    /// Number of texts embedded.
    pub fn embed_call_count(&self) -> usize {
        self.count("embed")
    }

    /// Number of chat completions requested.
    pub fn generate_call_count(&self) -> usize {
        self.count("chat")
    }

    /// Messages of the most recent chat call.
    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        lock(&self.call_log)
            .iter()
            .rev()
            .find(|c| c.operation == "chat")
            .map(|c| c.messages.clone())
    }

    fn count(&self, operation: &str) -> usize {
        lock(&self.call_log)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn log_call(&self, operation: &str, input: &str, messages: Vec<ChatMessage>) {
        lock(&self.call_log).push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            messages,
            timestamp: std::time::Instant::now(),
        });
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn reply_for(&self, input: &str) -> String {
        if let Some(scripted) = lock(&self.script).pop_front() {
            return scripted;
        }
        self.config
            .response_mappings
            .iter()
            .find(|(needle, _)| input.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| self.config.default_response.clone())
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.simulate_latency().await;
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            self.log_call("embed", text, Vec::new());
            if self.config.fail_embedding {
                return Err(Error::Embedding("Simulated embedding failure".to_string()));
            }
            vectors.push(Vector::from(MockEmbeddingGenerator::generate(
                text,
                self.config.dimension,
            )));
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let input = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.log_call("chat", &input, messages.to_vec());
        self.simulate_latency().await;

        if self.config.fail_generation {
            return Err(Error::Inference("Simulated generation failure".to_string()));
        }
        Ok(self.reply_for(&input))
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(!(self.config.fail_embedding || self.config.fail_generation))
    }
}

/// Deterministic embedding generator.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Unit-length embedding derived from the text's characters.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let dimension = dimension.max(1);
        let mut embedding = vec![0.0f32; dimension];

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            embedding[idx] += 0.1;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }
        embedding
    }

    /// Cosine similarity of two equal-length vectors.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if mag_a == 0.0 || mag_b == 0.0 {
            0.0
        } else {
            dot / (mag_a * mag_b)
        }
    }
}

/// Emotion classifier that returns a fixed score vector.
///
/// Frames are still decoded, so malformed input fails the same way it does
/// against the real model.
#[derive(Clone)]
pub struct MockEmotionClassifier {
    scores: Vec<f32>,
    available: bool,
    calls: Arc<Mutex<usize>>,
}

impl MockEmotionClassifier {
    /// Classifier whose every frame yields `emotion` with `confidence`.
    pub fn new(emotion: EmotionLabel, confidence: f32) -> Self {
        let rest = (1.0 - confidence).max(0.0) / 3.0;
        let scores = EmotionLabel::ALL
            .iter()
            .map(|label| if *label == emotion { confidence } else { rest.min(confidence) })
            .collect();
        Self::with_scores(scores)
    }

    pub fn with_scores(scores: Vec<f32>) -> Self {
        Self {
            scores,
            available: true,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Report the model as unavailable.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.calls)
    }
}

#[async_trait]
impl EmotionClassifier for MockEmotionClassifier {
    async fn classify(&self, frame: &str) -> Result<EmotionPrediction> {
        *lock(&self.calls) += 1;
        decode_frame(frame)?;
        if !self.available {
            return Err(Error::Inference("Emotion model unavailable".to_string()));
        }
        EmotionPrediction::from_scores(&self.scores)
    }

    async fn status(&self) -> ClassifierStatus {
        ClassifierStatus {
            available: self.available,
            model: "mock-emotion".to_string(),
            detail: (!self.available).then(|| "mock marked unavailable".to_string()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-emotion"
    }
}
