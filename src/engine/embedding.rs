//! Embedding provider contract and the built-in hash-bucket provider.
//!
//! The engine never computes semantics itself; it consumes fixed-
//! dimension vectors from an [`EmbeddingProvider`]. The built-in
//! provider hashes terms into buckets and weights by term frequency,
//! which is deterministic and always available. Neural providers plug
//! in through the same trait.

use crate::core::config::CharterConfig;
use crate::core::error::CharterError;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

pub trait EmbeddingProvider: Send + Sync {
    /// Convert text to a vector of exactly `dimensions()` entries.
    fn embed(&self, text: &str) -> Result<Vec<f32>, CharterError>;
    fn dimensions(&self) -> usize;
    fn name(&self) -> &str;
}

/// Deterministic term-frequency embedding over hashed buckets.
///
/// Terms are FNV-1a hashed into a fixed number of buckets and weighted
/// by frequency times a length-log factor (short terms are likely
/// stopwords). The result is L2 normalized, so cosine similarity of two
/// outputs reduces to their dot product. Empty or all-stopword text
/// yields the zero vector, which the matcher treats as "no opinion".
pub struct HashBucketProvider {
    dimensions: usize,
}

impl HashBucketProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h as usize) % dims
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.len() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    fn term_vector(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return vec![0.0; self.dimensions];
        }

        let mut tf: FxHashMap<String, f32> = FxHashMap::default();
        for tok in &tokens {
            *tf.entry(tok.clone()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        let mut vec = vec![0.0f32; self.dimensions];
        for (term, count) in &tf {
            let freq = count / total;
            let weight = 1.0 + (term.len() as f32).ln();
            vec[Self::bucket(term, self.dimensions)] += freq * weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl EmbeddingProvider for HashBucketProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, CharterError> {
        Ok(self.term_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash-bucket"
    }
}

/// Instantiate the provider named in configuration.
pub fn provider_from_config(
    cfg: &CharterConfig,
) -> Result<Arc<dyn EmbeddingProvider>, CharterError> {
    match cfg.embedding.provider.as_str() {
        "hash-bucket" => Ok(Arc::new(HashBucketProvider::new(cfg.embedding.dimensions))),
        other => Err(CharterError::Config(format!(
            "unknown embedding provider '{}'",
            other
        ))),
    }
}

/// Run a provider call with an explicit deadline. A timed-out call is
/// indistinguishable from a provider error to the caller.
pub fn embed_with_timeout(
    provider: &Arc<dyn EmbeddingProvider>,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, CharterError> {
    let (tx, rx) = mpsc::channel();
    let p = Arc::clone(provider);
    let owned = text.to_string();
    std::thread::spawn(move || {
        let _ = tx.send(p.embed(&owned));
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(CharterError::ProviderUnavailable(format!(
            "embed timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Little-endian f32 codec for the BLOB embedding column.
pub fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
