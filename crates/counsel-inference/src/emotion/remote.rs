//! TensorFlow-Serving REST client for the emotion model.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use counsel_core::{defaults, Error, Result};

use super::frame::{decode_frame, nest, preprocess};
use super::{ClassifierStatus, EmotionClassifier, EmotionPrediction};

/// Where the emotion model is served.
#[derive(Debug, Clone)]
pub struct EmotionModelConfig {
    pub base_url: String,
    pub model_name: String,
    pub timeout_seconds: u64,
}

impl Default for EmotionModelConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::EMOTION_MODEL_URL.to_string(),
            model_name: defaults::EMOTION_MODEL_NAME.to_string(),
            timeout_seconds: defaults::EMOTION_TIMEOUT_SECS,
        }
    }
}

impl EmotionModelConfig {
    /// Read `EMOTION_MODEL_URL`, `EMOTION_MODEL_NAME` and `EMOTION_TIMEOUT`.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            base_url: std::env::var("EMOTION_MODEL_URL").unwrap_or(base.base_url),
            model_name: std::env::var("EMOTION_MODEL_NAME").unwrap_or(base.model_name),
            timeout_seconds: std::env::var("EMOTION_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.timeout_seconds),
        }
    }
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<Vec<Vec<Vec<f32>>>>,
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ModelStatusResponse {
    #[serde(default)]
    model_version_status: Vec<ModelVersionStatus>,
}

#[derive(Deserialize)]
struct ModelVersionStatus {
    #[serde(default)]
    state: String,
}

/// Emotion classifier backed by a remote model server.
pub struct RemoteEmotionClassifier {
    client: Client,
    config: EmotionModelConfig,
}

impl RemoteEmotionClassifier {
    pub fn new(config: EmotionModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "emotion",
            url = %config.base_url,
            model = %config.model_name,
            "Initializing emotion classifier"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EmotionModelConfig::from_env())
    }

    fn model_url(&self) -> String {
        format!(
            "{}/v1/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_name
        )
    }
}

#[async_trait]
impl EmotionClassifier for RemoteEmotionClassifier {
    async fn classify(&self, frame: &str) -> Result<EmotionPrediction> {
        let frame = frame.to_string();
        // Decoding and resizing are CPU bound.
        let tensor = tokio::task::spawn_blocking(move || {
            decode_frame(&frame).map(|img| nest(&preprocess(&img)))
        })
        .await
        .map_err(|e| Error::Internal(format!("Frame preprocessing panicked: {}", e)))??;

        let response = self
            .client
            .post(format!("{}:predict", self.model_url()))
            .json(&PredictRequest {
                instances: vec![tensor],
            })
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Emotion model request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Inference(format!(
                "Emotion model returned {}",
                response.status()
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse prediction: {}", e)))?;

        let scores = body
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference("Emotion model returned no predictions".to_string()))?;

        let prediction = EmotionPrediction::from_scores(&scores)?;
        debug!(
            subsystem = "inference",
            op = "classify",
            emotion = %prediction.emotion,
            confidence = prediction.confidence,
            "Classified frame"
        );
        Ok(prediction)
    }

    async fn status(&self) -> ClassifierStatus {
        let unavailable = |detail: String| ClassifierStatus {
            available: false,
            model: self.config.model_name.clone(),
            detail: Some(detail),
        };

        let response = match self
            .client
            .get(self.model_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Emotion model status check failed");
                return unavailable(e.to_string());
            }
        };

        if !response.status().is_success() {
            return unavailable(format!("model server returned {}", response.status()));
        }

        let state = response
            .json::<ModelStatusResponse>()
            .await
            .ok()
            .and_then(|s| s.model_version_status.into_iter().next())
            .map(|v| v.state);

        match state {
            Some(state) if state != "AVAILABLE" => unavailable(state),
            _ => ClassifierStatus {
                available: true,
                model: self.config.model_name.clone(),
                detail: None,
            },
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_url() {
        let classifier = RemoteEmotionClassifier::new(EmotionModelConfig {
            base_url: "http://serving:8501/".to_string(),
            model_name: "faces".to_string(),
            timeout_seconds: 1,
        })
        .unwrap();
        assert_eq!(classifier.model_url(), "http://serving:8501/v1/models/faces");
    }
}
