use crate::error::{RagError, Result};
use log::{debug, info};
use mime_guess::from_path;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// Path the document was read from
    pub path: PathBuf,
    /// The actual text content of the document
    pub content: String,
}

impl Document {
    /// Create a new document from a plain-text file
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();

        if !is_plain_text(path) {
            return Err(RagError::retrieval(format!(
                "Unsupported document format: {}. Only plain-text files are supported.",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            RagError::retrieval(format!("Failed to read text file {}: {}", path.display(), e))
        })?;

        Ok(Document {
            path: path.to_path_buf(),
            content,
        })
    }

    /// Path rendered for source headers
    pub fn source(&self) -> String {
        self.path.display().to_string()
    }
}

/// Load every plain-text file under `data_dir`, recursively, in path order
pub fn load_documents<P: AsRef<Path>>(data_dir: P) -> Result<Vec<Document>> {
    let data_dir = data_dir.as_ref();

    if !data_dir.is_dir() {
        return Err(RagError::MissingDataDirectory(data_dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(data_dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() || !is_plain_text(entry.path()) {
            continue;
        }

        debug!("Reading {}", entry.path().display());
        documents.push(Document::from_file(entry.path())?);
    }

    info!(
        "Loaded {} document(s) from {}",
        documents.len(),
        data_dir.display()
    );
    Ok(documents)
}

fn is_plain_text(path: &Path) -> bool {
    from_path(path).first_or_octet_stream().essence_str() == "text/plain"
}
