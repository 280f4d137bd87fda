//! Embedding engine: one loaded model shared read-only by every caller.
//!
//! Backends implement [`Embedder`]. The engine adds the policies that must be
//! identical across backends: empty text maps to the zero vector, long text is
//! truncated to the first `max_input_tokens` tokens, and every vector is tagged
//! with the model version that produced it.

use crate::config::ModelConfig;
use crate::error::{Result, ResumeMatchError};
use crate::processing::text_processor::TextProcessor;
use crate::runtime::run_blocking;
use log::info;
use model2vec_rs::model::StaticModel;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const INFERENCE_OPERATION: &str = "embedding inference";

const HASH_MODEL_PREFIX: &str = "hash";
const DEFAULT_HASH_DIMENSION: usize = 256;

/// Changing these keys changes every hashed vector; bump `HASH_MODEL_REVISION`.
const HASH_SEED_K0: u64 = 0x5265_7375_6d65_4d61;
const HASH_SEED_K1: u64 = 0x7463_6865_7220_7631;
const HASH_MODEL_REVISION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub values: Vec<f32>,
    pub model_version: String,
}

impl EmbeddingVector {
    pub fn zeros(dimension: usize, model_version: &str) -> Self {
        Self {
            values: vec![0.0; dimension],
            model_version: model_version.to_string(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Cosine similarity in [-1, 1].
    ///
    /// Vectors from different model versions are never compared. A zero
    /// vector has minimum similarity (-1) to everything.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> Result<f32> {
        if self.model_version != other.model_version || self.dimension() != other.dimension() {
            return Err(ResumeMatchError::IncompatibleEmbeddings {
                resume_model: format!("{} ({}d)", self.model_version, self.dimension()),
                job_model: format!("{} ({}d)", other.model_version, other.dimension()),
            });
        }

        let norm_a = self.norm();
        let norm_b = other.norm();
        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(-1.0);
        }

        let dot: f32 = self.values.iter().zip(other.values.iter()).map(|(x, y)| x * y).sum();
        Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
    }
}

/// A loaded text embedding model.
///
/// Implementations must be deterministic and safe to call concurrently
/// through a shared reference.
pub trait Embedder: Send + Sync {
    /// Identifier that changes whenever vectors stop being comparable
    fn model_version(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed `text`, keeping at most its first `max_tokens` tokens
    fn embed_truncated(&self, text: &str, max_tokens: usize) -> Vec<f32>;
}

/// Model2Vec static embeddings
pub struct StaticEmbedder {
    model: StaticModel,
    version: String,
    dimension: usize,
}

impl StaticEmbedder {
    /// Load from a local directory or a HuggingFace repo id
    pub fn load(identifier: &str, models_dir: &Path) -> Result<Self> {
        let source = Self::resolve_source(identifier, models_dir);
        let start_time = Instant::now();

        info!("Loading Model2Vec embedding model from: {}", source.display());
        let model = StaticModel::from_pretrained(&source, None, None, None)?;

        let dimension = model
            .encode_with_args(&[String::new()], Some(1), 1)
            .first()
            .map(Vec::len)
            .unwrap_or(0);
        if dimension == 0 {
            return Err(ResumeMatchError::ModelLoad(format!(
                "Model '{}' produced zero-dimensional embeddings",
                identifier
            )));
        }

        info!(
            "Model loaded successfully in {:.2?} ({} dimensions)",
            start_time.elapsed(),
            dimension
        );

        Ok(Self {
            model,
            version: format!("model2vec:{}:{}d", identifier, dimension),
            dimension,
        })
    }

    fn resolve_source(identifier: &str, models_dir: &Path) -> PathBuf {
        let direct = PathBuf::from(identifier);
        if direct.exists() {
            return direct;
        }

        let local = models_dir.join(identifier);
        if local.exists() {
            return local;
        }

        // not on disk: treated as a HuggingFace repo id
        direct
    }
}

impl Embedder for StaticEmbedder {
    fn model_version(&self) -> &str {
        &self.version
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_truncated(&self, text: &str, max_tokens: usize) -> Vec<f32> {
        self.model
            .encode_with_args(&[text.to_string()], Some(max_tokens), 1)
            .into_iter()
            .next()
            .unwrap_or_else(|| vec![0.0; self.dimension])
    }
}

/// Feature-hashing embedder over word unigrams and bigrams.
///
/// Needs no weights, so it doubles as the backend for tests and for
/// deployments without a downloaded model.
pub struct HashEmbedder {
    dimension: usize,
    version: String,
    processor: TextProcessor,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            version: format!("{}-v{}:{}d", HASH_MODEL_PREFIX, HASH_MODEL_REVISION, dimension),
            processor: TextProcessor::new(),
        }
    }

    fn hash(feature: &str) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        hasher.write(feature.as_bytes());
        hasher.finish()
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let h = Self::hash(feature);
        let idx = (h % self.dimension as u64) as usize;
        // top bit picks the sign so collisions tend to cancel
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign * weight;
    }
}

impl Embedder for HashEmbedder {
    fn model_version(&self) -> &str {
        &self.version
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_truncated(&self, text: &str, max_tokens: usize) -> Vec<f32> {
        let mut tokens = self.processor.tokenize(text);
        tokens.truncate(max_tokens);

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// Shared handle to the process-wide embedding model.
///
/// Cloning is cheap; every clone uses the same loaded weights. The model is
/// never swapped once loaded.
#[derive(Clone)]
pub struct EmbeddingEngine {
    embedder: Arc<dyn Embedder>,
    max_input_tokens: usize,
}

impl EmbeddingEngine {
    pub fn new(embedder: Arc<dyn Embedder>, max_input_tokens: usize) -> Self {
        Self {
            embedder,
            max_input_tokens: max_input_tokens.max(1),
        }
    }

    /// Load the configured model. Failure here is fatal for the caller's
    /// startup: nothing should be served without a model.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = match parse_hash_identifier(&config.model_identifier)? {
            Some(dimension) => {
                info!("Using feature-hashing embeddings ({} dimensions)", dimension);
                Arc::new(HashEmbedder::new(dimension))
            }
            None => Arc::new(StaticEmbedder::load(
                &config.model_identifier,
                &config.models_dir,
            )?),
        };

        Ok(Self::new(embedder, config.max_input_tokens))
    }

    pub fn hashed(dimension: usize, max_input_tokens: usize) -> Self {
        Self::new(Arc::new(HashEmbedder::new(dimension)), max_input_tokens)
    }

    pub fn model_version(&self) -> &str {
        self.embedder.model_version()
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    pub fn embed(&self, text: &str) -> EmbeddingVector {
        if text.trim().is_empty() {
            return EmbeddingVector::zeros(self.dimension(), self.model_version());
        }

        let values = self.embedder.embed_truncated(text, self.max_input_tokens);
        EmbeddingVector {
            values,
            model_version: self.model_version().to_string(),
        }
    }

    /// Run inference on the blocking pool, discarding the vector if it does
    /// not finish within `timeout`.
    pub async fn embed_with_timeout(&self, text: String, timeout: Duration) -> Result<EmbeddingVector> {
        let engine = self.clone();
        run_blocking(INFERENCE_OPERATION, timeout, move || Ok(engine.embed(&text))).await
    }
}

/// `hash` or `hash:<dim>` -> Some(dim); anything else -> None
fn parse_hash_identifier(identifier: &str) -> Result<Option<usize>> {
    let trimmed = identifier.trim();
    if trimmed == HASH_MODEL_PREFIX {
        return Ok(Some(DEFAULT_HASH_DIMENSION));
    }

    match trimmed.strip_prefix("hash:") {
        Some(dim) => dim
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|d| *d > 0)
            .map(Some)
            .ok_or_else(|| {
                ResumeMatchError::ModelLoad(format!("Invalid hash model dimension in '{}'", identifier))
            }),
        None => Ok(None),
    }
}

/// Embedders for exercising deadlines
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Hash embedder that stalls on texts containing `trigger`
    pub struct SlowEmbedder {
        inner: HashEmbedder,
        trigger: &'static str,
        delay: Duration,
    }

    impl SlowEmbedder {
        pub fn new(trigger: &'static str, delay: Duration) -> Self {
            Self {
                inner: HashEmbedder::new(64),
                trigger,
                delay,
            }
        }
    }

    impl Embedder for SlowEmbedder {
        fn model_version(&self) -> &str {
            self.inner.model_version()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed_truncated(&self, text: &str, max_tokens: usize) -> Vec<f32> {
            if text.contains(self.trigger) {
                std::thread::sleep(self.delay);
            }
            self.inner.embed_truncated(text, max_tokens)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::SlowEmbedder;
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_embedding_is_bit_identical() {
        let engine = EmbeddingEngine::hashed(64, 512);
        let a = engine.embed("Senior Rust engineer with distributed systems background");
        let b = engine.embed("Senior Rust engineer with distributed systems background");

        let bits_a: Vec<u32> = a.values.iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u32> = b.values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
        assert_eq!(a.model_version, b.model_version);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let engine = EmbeddingEngine::hashed(32, 512);
        let empty = engine.embed("");
        assert_eq!(empty.dimension(), 32);
        assert!(empty.is_zero());

        let other = engine.embed("python developer");
        assert_eq!(empty.cosine_similarity(&other).unwrap(), -1.0);
    }

    #[test]
    fn test_truncation_keeps_first_tokens() {
        let engine = EmbeddingEngine::hashed(128, 3);
        let short = engine.embed("rust python kafka");
        let long = engine.embed("rust python kafka kubernetes terraform ansible");
        assert_eq!(short.values, long.values);
    }

    #[test]
    fn test_hashed_vectors_are_normalized() {
        let engine = EmbeddingEngine::hashed(256, 512);
        let v = engine.embed("machine learning engineer pytorch");
        assert!((v.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let engine = EmbeddingEngine::hashed(512, 512);
        let job = engine.embed("python data engineer spark airflow");
        let close = engine.embed("data engineer python spark pipelines airflow");
        let far = engine.embed("pastry chef croissants bakery");

        let close_sim = close.cosine_similarity(&job).unwrap();
        let far_sim = far.cosine_similarity(&job).unwrap();
        assert!(close_sim > far_sim);
    }

    #[test]
    fn test_different_models_are_incompatible() {
        let a = EmbeddingEngine::hashed(64, 512).embed("rust");
        let b = EmbeddingEngine::hashed(128, 512).embed("rust");

        let err = a.cosine_similarity(&b).unwrap_err();
        assert!(matches!(err, ResumeMatchError::IncompatibleEmbeddings { .. }));
    }

    #[test]
    fn test_hash_identifiers() {
        assert_eq!(parse_hash_identifier("hash").unwrap(), Some(DEFAULT_HASH_DIMENSION));
        assert_eq!(parse_hash_identifier("hash:64").unwrap(), Some(64));
        assert_eq!(parse_hash_identifier("minishlab/potion-base-8M").unwrap(), None);
        assert!(parse_hash_identifier("hash:zero").is_err());
        assert!(parse_hash_identifier("hash:0").is_err());
    }

    #[test]
    fn test_missing_local_model_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let model_dir = temp_dir.path().join("broken-model");
        std::fs::create_dir_all(&model_dir).unwrap();

        let config = ModelConfig {
            models_dir: temp_dir.path().to_path_buf(),
            model_identifier: "broken-model".to_string(),
            max_input_tokens: 512,
        };
        let err = EmbeddingEngine::load(&config).err().unwrap();
        assert!(matches!(err, ResumeMatchError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn test_embed_with_timeout() {
        let engine = EmbeddingEngine::hashed(64, 512);
        let v = engine
            .embed_with_timeout("rust".to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(v, engine.embed("rust"));
    }

    #[tokio::test]
    async fn test_slow_inference_times_out() {
        let engine = EmbeddingEngine::new(
            Arc::new(SlowEmbedder::new("slow", Duration::from_millis(300))),
            512,
        );

        let err = engine
            .embed_with_timeout("a slow document".to_string(), Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_recoverable());

        let fast = engine
            .embed_with_timeout("a quick document".to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(fast.dimension(), 64);
    }
}
