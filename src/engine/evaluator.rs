//! Compliance Evaluator: embed the action, match it against the
//! tenant's in-effect principles, classify, aggregate, and log.
//!
//! A single evaluation walks PENDING → EMBEDDING → MATCHING →
//! CLASSIFIED → LOGGED; a provider failure in non-fallback mode fails
//! the whole evaluation before any row is written. The log append is
//! the final step and is all-or-nothing.

use crate::core::broker::DbBroker;
use crate::core::config::{CharterConfig, FallbackPolicy};
use crate::core::error::CharterError;
use crate::core::output;
use crate::core::store::Store;
use crate::core::time;
use crate::engine::embedding::{self, EmbeddingProvider};
use crate::engine::log::{self, EvaluationRow};
use crate::engine::matcher::{self, CandidateScope};
use crate::engine::polarity::{Polarity, PolarityClassifier};
use crate::engine::tenants;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPrinciple {
    pub principle_id: String,
    pub body: String,
    pub category: String,
    pub similarity: f64,
    pub polarity: Polarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The action was embedded and scored against the candidate set.
    Scored,
    /// The provider was unavailable and the fallback policy said to
    /// proceed; no score was fabricated.
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub evaluation_id: String,
    pub tenant_id: Option<String>,
    pub action: String,
    pub verdict: Verdict,
    /// Mean similarity of matched principles, clamped to [0,1]. `None`
    /// only for `Unknown` verdicts.
    pub score: Option<f64>,
    pub matched: Vec<MatchedPrinciple>,
    pub violations: Vec<MatchedPrinciple>,
    pub recommendations: Vec<String>,
    pub skipped_unembedded: usize,
    pub created_at: String,
}

/// Evaluate one action for a tenant (or system-wide when `tenant_id`
/// is `None`, scoping to the global active set). Every completed
/// evaluation — scored or unknown — is appended to the evaluation log
/// before this function returns.
pub fn evaluate(
    store: &Store,
    cfg: &CharterConfig,
    provider: &Arc<dyn EmbeddingProvider>,
    classifier: &dyn PolarityClassifier,
    tenant_id: Option<&str>,
    action: &str,
    metadata: Option<JsonValue>,
) -> Result<EvaluationResult, CharterError> {
    let action = action.trim();
    if action.is_empty() {
        return Err(CharterError::Validation(
            "action text must not be empty".to_string(),
        ));
    }
    if let Some(id) = tenant_id {
        tenants::get_tenant(store, id)?;
    }

    let query = match embedding::embed_with_timeout(provider, action, cfg.provider_timeout()) {
        Ok(vector) => Some(vector),
        Err(e) => {
            // Observable either way; never a fabricated score.
            let broker = DbBroker::new(&store.root);
            let _ = broker.note("charter", "evaluate.embed_failed", "error");
            match cfg.embedding.on_provider_failure {
                FallbackPolicy::Fail => {
                    return Err(match e {
                        CharterError::ProviderUnavailable(_) => e,
                        other => CharterError::ProviderUnavailable(other.to_string()),
                    });
                }
                FallbackPolicy::Unknown => None,
            }
        }
    };

    let scope = match tenant_id {
        Some(id) => CandidateScope::Tenant(id.to_string()),
        None => CandidateScope::Global,
    };

    let mut result = EvaluationResult {
        evaluation_id: time::new_id(),
        tenant_id: tenant_id.map(|s| s.to_string()),
        action: action.to_string(),
        verdict: Verdict::Unknown,
        score: None,
        matched: Vec::new(),
        violations: Vec::new(),
        recommendations: Vec::new(),
        skipped_unembedded: 0,
        created_at: time::now_epoch_z(),
    };

    if let Some(query) = query {
        let ranking = matcher::rank(store, &scope, &query, cfg.matching.threshold)?;
        result.skipped_unembedded = ranking.skipped_unembedded;

        for scored in ranking.matched() {
            let polarity = classifier.classify(action, &scored.principle, scored.similarity);
            let matched = MatchedPrinciple {
                principle_id: scored.principle.id.clone(),
                body: scored.principle.body.clone(),
                category: scored.principle.category.clone(),
                similarity: scored.similarity,
                polarity,
            };
            if polarity == Polarity::Violating {
                result.violations.push(matched.clone());
            }
            result.matched.push(matched);
        }

        result.verdict = Verdict::Scored;
        result.score = Some(aggregate_score(&result.matched));

        if tenant_id.is_some() {
            result.recommendations = link_recommendations(store, cfg, &query, &result.matched)?;
        }
    }

    let entry = EvaluationRow {
        id: result.evaluation_id.clone(),
        tenant_id: result.tenant_id.clone(),
        action: result.action.clone(),
        result: serde_json::to_value(&result)
            .map_err(|e| CharterError::Validation(format!("verdict serialize: {}", e)))?,
        score: result.score,
        metadata,
        created_at: result.created_at.clone(),
    };
    log::append(store, &entry)?;

    Ok(result)
}

fn aggregate_score(matched: &[MatchedPrinciple]) -> f64 {
    if matched.is_empty() {
        return 0.0;
    }
    let mean = matched.iter().map(|m| m.similarity).sum::<f64>() / matched.len() as f64;
    mean.clamp(0.0, 1.0)
}

/// Global-active principles the tenant has not enabled but whose
/// similarity clears the threshold. Best-effort; legitimately empty.
fn link_recommendations(
    store: &Store,
    cfg: &CharterConfig,
    query: &[f32],
    matched: &[MatchedPrinciple],
) -> Result<Vec<String>, CharterError> {
    let global = matcher::rank(store, &CandidateScope::Global, query, cfg.matching.threshold)?;
    let in_scope: Vec<&str> = matched.iter().map(|m| m.principle_id.as_str()).collect();
    Ok(global
        .matched()
        .iter()
        .filter(|s| !in_scope.contains(&s.principle.id.as_str()))
        .map(|s| {
            format!(
                "consider linking principle {} ({}): {}",
                s.principle.id,
                s.principle.category,
                output::compact_line(&s.principle.body, 80)
            )
        })
        .collect())
}

/// Evaluate a batch of actions, embedding and matching in parallel.
/// Log appends stay serialized through the broker; results preserve
/// input order. Fails fast on the first invalid action.
pub fn evaluate_batch(
    store: &Store,
    cfg: &CharterConfig,
    provider: &Arc<dyn EmbeddingProvider>,
    classifier: &(dyn PolarityClassifier),
    tenant_id: Option<&str>,
    actions: &[String],
    metadata: Option<JsonValue>,
) -> Result<Vec<EvaluationResult>, CharterError> {
    actions
        .par_iter()
        .map(|action| {
            evaluate(
                store,
                cfg,
                provider,
                classifier,
                tenant_id,
                action,
                metadata.clone(),
            )
        })
        .collect()
}
