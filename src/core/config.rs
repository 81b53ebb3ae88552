//! Engine configuration, loaded from `charter.toml` at the store root.
//!
//! Every knob the spec treats as an explicit parameter lives here: the
//! embedding dimension, the provider timeout, the fallback policy for
//! provider failures, the match threshold, and the violation-marker
//! lexicon used by the default polarity strategy. A missing file means
//! all defaults.

use crate::core::error::CharterError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "charter.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CharterConfig {
    pub embedding: EmbeddingConfig,
    pub matching: MatchingConfig,
    pub polarity: PolarityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// System-wide vector dimension. A stored or computed vector of any
    /// other length is a hard error, never truncated or padded.
    pub dimensions: usize,
    pub provider: String,
    pub timeout_ms: u64,
    /// What the evaluator does when the provider fails or times out.
    pub on_provider_failure: FallbackPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Fail the whole evaluation; nothing is logged to the evaluation log.
    Fail,
    /// Proceed without an embedding: verdict `unknown`, score null, logged.
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum cosine similarity for a candidate to count as a match.
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarityConfig {
    /// Obligation markers for the lexicon polarity strategy. Data, not
    /// code: deployments tune these without rebuilding.
    pub violation_markers: Vec<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 384,
            provider: "hash-bucket".to_string(),
            timeout_ms: 5000,
            on_provider_failure: FallbackPolicy::Fail,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { threshold: 0.2 }
    }
}

impl Default for PolarityConfig {
    fn default() -> Self {
        Self {
            violation_markers: ["must not", "never", "prohibited", "forbidden", "must be"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CharterConfig {
    pub fn load(root: &Path) -> Result<Self, CharterError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw)
            .map_err(|e| CharterError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.embedding.timeout_ms)
    }
}
