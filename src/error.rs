use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors raised while indexing or answering questions
#[derive(Debug, Error)]
pub enum RagError {
    /// The documents directory does not exist
    #[error("documents directory not found: {}", .0.display())]
    MissingDataDirectory(PathBuf),

    /// No persisted vector store exists at query time
    #[error("vector store not found: {0}")]
    MissingPersistedStore(String),

    /// Embedding or completion model could not be obtained
    #[error("model unavailable: {0}")]
    ModelLoad(String),

    /// Completion endpoint rejected the request or was unreachable
    #[error("completion request rejected: {0}")]
    Credential(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Anything else that went wrong during retrieval
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Guidance shown to the user next to the raw error message
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingDataDirectory(_) => {
                Some("Please add .txt files to the documents directory first.")
            }
            Self::MissingPersistedStore(_) => Some(
                "Make sure you've built the database by running `owl-assistant index`.",
            ),
            Self::ModelLoad(_) => {
                Some("Check the model name and that the model files can be downloaded.")
            }
            Self::Credential(_) => Some("Check your API key and network connection."),
            Self::Config(_) => Some("Check the OWL_* environment variables and CLI flags."),
            Self::Retrieval(_) | Self::Io(_) | Self::Json(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_follow_taxonomy() {
        let missing = RagError::MissingPersistedStore("chromadb".to_string());
        assert!(missing.hint().unwrap().contains("index"));

        let credential = RagError::Credential("401 Unauthorized".to_string());
        assert!(credential.hint().unwrap().contains("API key"));

        assert!(RagError::retrieval("boom").hint().is_none());
    }
}
