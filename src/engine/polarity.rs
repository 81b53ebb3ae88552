//! Polarity classification: is a matched principle satisfied or
//! violated by the action?
//!
//! Similarity alone cannot tell; "store passwords in plain text" and
//! "encrypt passwords at rest" are close in embedding space precisely
//! because one violates the other. Classification is therefore an
//! injectable strategy supplied by the caller or configuration, never
//! text heuristics hard-wired into the evaluator.

use crate::core::config::CharterConfig;
use crate::engine::principles::Principle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Compliant,
    Violating,
    Neutral,
}

pub trait PolarityClassifier: Send + Sync {
    fn classify(&self, action: &str, principle: &Principle, similarity: f64) -> Polarity;
}

/// Defers interpretation entirely: every match is neutral. For callers
/// with their own compliance framework downstream.
pub struct NeutralPolarity;

impl PolarityClassifier for NeutralPolarity {
    fn classify(&self, _action: &str, _principle: &Principle, _similarity: f64) -> Polarity {
        Polarity::Neutral
    }
}

/// Marker-lexicon strategy: a matched principle whose body carries a
/// configured obligation marker ("must not", "prohibited", ...) is
/// flagged as violating for the action that matched it. The lexicon is
/// configuration data, so deployments tune it without a rebuild.
pub struct LexiconPolarity {
    markers: Vec<String>,
}

impl LexiconPolarity {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn from_config(cfg: &CharterConfig) -> Self {
        Self::new(cfg.polarity.violation_markers.clone())
    }
}

impl PolarityClassifier for LexiconPolarity {
    fn classify(&self, _action: &str, principle: &Principle, _similarity: f64) -> Polarity {
        let body = principle.body.to_lowercase();
        if self.markers.iter().any(|m| body.contains(m.as_str())) {
            Polarity::Violating
        } else {
            Polarity::Neutral
        }
    }
}

pub fn classifier_from_config(cfg: &CharterConfig) -> Box<dyn PolarityClassifier> {
    Box::new(LexiconPolarity::from_config(cfg))
}
