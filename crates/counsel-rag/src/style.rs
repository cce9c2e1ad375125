//! Tone examples that keep replies friendly and casual.
//!
//! The dataset is a CSV with `original` and `converted` columns: the same
//! sentence written formally and in the conversational register the bot
//! should use. A few random pairs go into every system prompt.

use std::path::Path;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{info, warn};

use counsel_core::{Error, Result};

/// One formal/casual sentence pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StylePair {
    pub original: String,
    pub converted: String,
}

/// Loaded tone dataset.
#[derive(Debug, Clone, Default)]
pub struct StyleExamples {
    pairs: Vec<StylePair>,
}

impl StyleExamples {
    pub fn from_pairs(pairs: Vec<StylePair>) -> Self {
        Self { pairs }
    }

    /// Read pairs from a CSV file. Rows with an empty side are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| Error::Config(format!("Cannot open style dataset {}: {e}", path.display())))?;

        let mut pairs = Vec::new();
        for record in reader.deserialize::<StylePair>() {
            let pair = record
                .map_err(|e| Error::Config(format!("Malformed style dataset row: {e}")))?;
            if pair.original.trim().is_empty() || pair.converted.trim().is_empty() {
                continue;
            }
            pairs.push(pair);
        }

        info!(
            subsystem = "rag",
            component = "style",
            path = %path.display(),
            result_count = pairs.len(),
            "Loaded style examples"
        );
        Ok(Self { pairs })
    }

    /// Load when a path is configured. A missing or unreadable file disables
    /// style guidance instead of failing startup.
    pub fn load_optional(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load(path).unwrap_or_else(|e| {
                warn!(error = %e, "Style dataset unavailable, continuing without it");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Up to `n` distinct random pairs.
    pub fn sample(&self, n: usize) -> Vec<&StylePair> {
        self.pairs
            .choose_multiple(&mut rand::thread_rng(), n)
            .collect()
    }

    /// Render `n` random pairs as few-shot guidance, `None` when there are none.
    pub fn render_sample(&self, n: usize) -> Option<String> {
        let sample = self.sample(n);
        if sample.is_empty() {
            return None;
        }
        Some(
            sample
                .iter()
                .map(|pair| format!("- 원본: {}\n  - 변환: {}", pair.original, pair.converted))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}
