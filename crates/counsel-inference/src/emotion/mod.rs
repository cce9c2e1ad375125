//! Facial emotion classification for webcam frames.
//!
//! Frames arrive from the browser as base64 JPEG/PNG (optionally wrapped in a
//! data URL). [`frame`] turns them into the model's input tensor and
//! [`RemoteEmotionClassifier`] sends that tensor to a TensorFlow-Serving style
//! REST endpoint.

pub mod frame;
mod remote;

use async_trait::async_trait;
use serde::Serialize;

use counsel_core::{EmotionLabel, Error, Result};

pub use frame::{decode_frame, preprocess, INPUT_CHANNELS, TENSOR_LEN};
pub use remote::{EmotionModelConfig, RemoteEmotionClassifier};

/// Outcome of classifying one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionPrediction {
    pub emotion: EmotionLabel,
    /// Score of the winning class.
    pub confidence: f32,
    /// Raw scores in [`EmotionLabel::ALL`] order.
    pub scores: Vec<f32>,
}

impl EmotionPrediction {
    /// Argmax over a score vector. Ties go to the earlier label.
    pub fn from_scores(scores: &[f32]) -> Result<Self> {
        if scores.len() != EmotionLabel::ALL.len() {
            return Err(Error::Inference(format!(
                "Expected {} emotion scores, got {}",
                EmotionLabel::ALL.len(),
                scores.len()
            )));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(Error::Inference("Emotion scores are not finite".to_string()));
        }

        let (index, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, s)| if s > best.1 { (i, s) } else { best });

        let emotion = EmotionLabel::from_index(index)
            .ok_or_else(|| Error::Internal(format!("No emotion label at index {index}")))?;

        Ok(Self {
            emotion,
            confidence,
            scores: scores.to_vec(),
        })
    }
}

/// Reported state of the classifier model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifierStatus {
    pub available: bool,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Classifies a single webcam frame.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Classify a base64 frame (raw or data URL).
    async fn classify(&self, frame: &str) -> Result<EmotionPrediction>;

    /// Whether the model is loaded and serving.
    async fn status(&self) -> ClassifierStatus;

    fn model_name(&self) -> &str;
}
