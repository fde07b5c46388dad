use crate::error::{RagError, Result};
use crate::gemini::GeminiClient;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model identifier of the local sentence-embedding model
pub const MINILM_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Output dimension of all-MiniLM-L6-v2
pub const MINILM_DIMENSION: usize = 384;

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// `1 - cosine similarity`; zero vectors are treated as orthogonal
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
        for (a, b) in self.values.iter().zip(&other.values) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding { values }
    }
}

/// Maps text to fixed-dimension vectors
///
/// Implementations must be deterministic: the same text always yields the
/// same vector, so query and document embeddings are comparable.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Identifier recorded alongside the index
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Generate embeddings for a batch of texts, one per input, in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Generate the embedding for a single query
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::ModelLoad(format!("{} returned no embedding", self.model_id())))
    }
}

/// all-MiniLM-L6-v2 held resident in memory
pub struct LocalEmbedder {
    model: TextEmbedding,
}

impl LocalEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.as_ref();
        info!(
            "Loading embedding model {} (cache: {})",
            MINILM_MODEL_ID,
            cache_dir.display()
        );

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| RagError::ModelLoad(format!("{}: {}", MINILM_MODEL_ID, e)))?;

        Ok(LocalEmbedder { model })
    }
}

impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str {
        MINILM_MODEL_ID
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} text(s) locally", texts.len());

        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        // inference is CPU-bound; requires the multi-threaded runtime
        let vectors = tokio::task::block_in_place(|| self.model.embed(inputs, None))
            .map_err(|e| RagError::ModelLoad(format!("{}: {}", MINILM_MODEL_ID, e)))?;

        Ok(vectors.into_iter().map(Embedding::from).collect())
    }
}

/// Embedding backend chosen at runtime
pub enum EmbeddingBackend {
    Local(LocalEmbedder),
    Gemini(GeminiClient),
}

impl Embedder for EmbeddingBackend {
    fn model_id(&self) -> &str {
        match self {
            EmbeddingBackend::Local(local) => local.model_id(),
            EmbeddingBackend::Gemini(gemini) => gemini.model_id(),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            EmbeddingBackend::Local(local) => local.dimension(),
            EmbeddingBackend::Gemini(gemini) => gemini.dimension(),
        }
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        match self {
            EmbeddingBackend::Local(local) => local.embed_documents(texts).await,
            EmbeddingBackend::Gemini(gemini) => gemini.embed_documents(texts).await,
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        match self {
            EmbeddingBackend::Local(local) => local.embed_query(text).await,
            EmbeddingBackend::Gemini(gemini) => gemini.embed_query(text).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        let a = Embedding::from(vec![1.0, 0.0]);
        let b = Embedding::from(vec![0.0, 1.0]);
        let c = Embedding::from(vec![2.0, 0.0]);

        assert!(a.cosine_distance(&c).abs() < 1e-6);
        assert!((a.cosine_distance(&b) - 1.0).abs() < 1e-6);
        assert_eq!(a.cosine_distance(&Embedding::from(vec![0.0, 0.0])), 1.0);
    }
}
