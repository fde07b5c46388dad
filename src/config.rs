use crate::chunking::ChunkingConfig;
use crate::completion::CompletionConfig;
use crate::database::QdrantConfig;
use crate::error::{RagError, Result};
use crate::gemini::GeminiConfig;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PERSIST_DIR: &str = "chromadb";
pub const DEFAULT_MODEL_CACHE_DIR: &str = ".fastembed_cache";
pub const DEFAULT_TOP_K: usize = 3;

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    /// all-MiniLM-L6-v2 running in-process
    #[default]
    Local,
    /// Remote Gemini embedding endpoint
    Gemini,
}

impl FromStr for EmbedderKind {
    type Err = RagError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(EmbedderKind::Local),
            "gemini" => Ok(EmbedderKind::Gemini),
            other => Err(RagError::config(format!(
                "unknown embedder '{}', expected 'local' or 'gemini'",
                other
            ))),
        }
    }
}

impl fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedderKind::Local => write!(f, "local"),
            EmbedderKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// Which vector store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// JSON index inside the persistence directory
    #[default]
    Local,
    /// Collection on a Qdrant server
    Qdrant,
}

impl FromStr for StoreKind {
    type Err = RagError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(StoreKind::Local),
            "qdrant" => Ok(StoreKind::Qdrant),
            other => Err(RagError::config(format!(
                "unknown vector store '{}', expected 'local' or 'qdrant'",
                other
            ))),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Local => write!(f, "local"),
            StoreKind::Qdrant => write!(f, "qdrant"),
        }
    }
}

/// Application configuration assembled from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the .txt knowledge base
    pub data_dir: PathBuf,
    /// Directory holding the persisted local index
    pub persist_dir: PathBuf,
    pub chunking: ChunkingConfig,
    /// Number of passages retrieved per question
    pub top_k: usize,
    pub embedder: EmbedderKind,
    /// Where the local embedding model files are cached
    pub model_cache_dir: PathBuf,
    pub store: StoreKind,
    pub qdrant: Option<QdrantConfig>,
    pub gemini: Option<GeminiConfig>,
    /// Present only when completion credentials are supplied
    pub completion: Option<CompletionConfig>,
}

impl AppConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chunking = ChunkingConfig {
            chunk_size: parse_or(&lookup, "OWL_CHUNK_SIZE", ChunkingConfig::default().chunk_size)?,
            chunk_overlap: parse_or(
                &lookup,
                "OWL_CHUNK_OVERLAP",
                ChunkingConfig::default().chunk_overlap,
            )?,
        };

        Ok(AppConfig {
            data_dir: path_or(&lookup, "OWL_DATA_DIR", DEFAULT_DATA_DIR),
            persist_dir: path_or(&lookup, "OWL_PERSIST_DIR", DEFAULT_PERSIST_DIR),
            chunking,
            top_k: parse_or(&lookup, "OWL_TOP_K", DEFAULT_TOP_K)?,
            embedder: parse_or(&lookup, "OWL_EMBEDDER", EmbedderKind::default())?,
            model_cache_dir: path_or(&lookup, "OWL_MODEL_CACHE_DIR", DEFAULT_MODEL_CACHE_DIR),
            store: parse_or(&lookup, "OWL_VECTOR_STORE", StoreKind::default())?,
            qdrant: QdrantConfig::from_lookup(&lookup),
            gemini: GeminiConfig::from_lookup(&lookup),
            completion: CompletionConfig::from_lookup(&lookup)?,
        })
    }
}

/// Non-empty value for `key`, if any
pub(crate) fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse `key` as `T`, falling back to `default` when unset
pub(crate) fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| RagError::config(format!("{}={} is not a valid value", key, raw))),
        None => Ok(default),
    }
}

fn path_or<F>(lookup: &F, key: &str, default: &str) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    PathBuf::from(non_empty(lookup, key).unwrap_or_else(|| default.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.persist_dir, PathBuf::from("chromadb"));
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.embedder, EmbedderKind::Local);
        assert_eq!(config.store, StoreKind::Local);
        assert!(config.qdrant.is_none());
        assert!(config.completion.is_none());
    }

    #[test]
    fn test_overrides_and_completion() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("OWL_CHUNK_SIZE", "800"),
            ("OWL_TOP_K", "5"),
            ("OWL_VECTOR_STORE", "Qdrant"),
            ("QDRANT_URL", "http://localhost:6334"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OWL_TEMPERATURE", "0.7"),
        ]))
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.store, StoreKind::Qdrant);
        assert_eq!(
            config.qdrant.as_ref().map(|q| q.url.as_str()),
            Some("http://localhost:6334")
        );

        let completion = config.completion.unwrap();
        assert_eq!(completion.api_key, "sk-test");
        assert_eq!(completion.temperature, 0.7);
        assert_eq!(completion.max_tokens, 1000);
    }

    #[test]
    fn test_rejects_values_of_wrong_type() {
        let err = AppConfig::from_lookup(lookup_from(&[("OWL_TOP_K", "three")])).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        let err = AppConfig::from_lookup(lookup_from(&[("OWL_EMBEDDER", "word2vec")])).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn test_blank_api_key_means_no_completion() {
        let config = AppConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.completion.is_none());
    }
}
