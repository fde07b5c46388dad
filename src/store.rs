use crate::chunking::TextChunk;
use crate::database::QdrantStore;
use crate::embeddings::Embedding;
use crate::error::{RagError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Describes how an index was built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub model_id: String,
    pub dimension: usize,
}

/// A chunk and its embedding as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    /// Insertion ordinal, also the tie-breaker for equal distances
    pub id: u64,
    pub chunk: TextChunk,
    pub embedding: Embedding,
}

/// A retrieved chunk with its distance to the query (smaller is nearer)
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: TextChunk,
    pub distance: f32,
}

/// Persistent nearest-neighbour index over embeddings
#[allow(async_fn_in_trait)]
pub trait VectorStore {
    /// Replace all persisted content with `records`; returns how many were stored
    async fn rebuild(&mut self, manifest: IndexManifest, records: Vec<IndexedRecord>)
        -> Result<usize>;

    /// Up to `k` records nearest to `query`, nearest first
    async fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<SearchHit>>;

    /// How the persisted index was built; `None` when nothing is persisted
    async fn stored_manifest(&self) -> Result<Option<IndexManifest>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    manifest: IndexManifest,
    records: Vec<IndexedRecord>,
}

/// Brute-force cosine index persisted as JSON in a directory
pub struct LocalStore {
    dir: PathBuf,
    index: Option<PersistedIndex>,
}

impl LocalStore {
    pub const INDEX_FILE: &'static str = "index.json";

    /// A store rooted at `dir` with nothing loaded, for rebuilding
    pub fn empty<P: AsRef<Path>>(dir: P) -> Self {
        LocalStore {
            dir: dir.as_ref().to_path_buf(),
            index: None,
        }
    }

    /// Load the index persisted under `dir`, if there is one
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut store = Self::empty(dir);
        let path = store.index_path();

        match File::open(&path) {
            Ok(file) => {
                let index: PersistedIndex = serde_json::from_reader(BufReader::new(file))?;
                info!(
                    "Database loaded from {} ({} records, model {})",
                    store.dir.display(),
                    index.records.len(),
                    index.manifest.model_id
                );
                store.index = Some(index);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No persisted index at {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether an index is loaded
    pub fn exists(&self) -> bool {
        self.index.is_some()
    }

    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.index.as_ref().map(|index| &index.manifest)
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(Self::INDEX_FILE)
    }
}

impl VectorStore for LocalStore {
    async fn rebuild(
        &mut self,
        manifest: IndexManifest,
        records: Vec<IndexedRecord>,
    ) -> Result<usize> {
        if let Some(record) = records
            .iter()
            .find(|record| record.embedding.dimension() != manifest.dimension)
        {
            return Err(RagError::retrieval(format!(
                "record {} has dimension {}, expected {}",
                record.id,
                record.embedding.dimension(),
                manifest.dimension
            )));
        }

        fs::create_dir_all(&self.dir)?;
        let index = PersistedIndex { manifest, records };

        // write to a sibling file first so a failed rebuild keeps the old index
        let path = self.index_path();
        let staging = path.with_extension("json.tmp");
        let mut writer = BufWriter::new(File::create(&staging)?);
        serde_json::to_writer(&mut writer, &index)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&staging, &path)?;

        let count = index.records.len();
        info!("Database created and saved to {}", self.dir.display());
        self.index = Some(index);
        Ok(count)
    }

    async fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<SearchHit>> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| RagError::MissingPersistedStore(self.dir.display().to_string()))?;

        if !index.records.is_empty() && query.dimension() != index.manifest.dimension {
            return Err(RagError::retrieval(format!(
                "query has dimension {} but the index was built with {} ({})",
                query.dimension(),
                index.manifest.dimension,
                index.manifest.model_id
            )));
        }

        let mut scored: Vec<(f32, &IndexedRecord)> = index
            .records
            .iter()
            .map(|record| (record.embedding.cosine_distance(query), record))
            .collect();
        // stable sort keeps insertion order among equal distances
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, record)| SearchHit {
                chunk: record.chunk.clone(),
                distance,
            })
            .collect())
    }

    async fn stored_manifest(&self) -> Result<Option<IndexManifest>> {
        Ok(self.manifest().cloned())
    }
}

/// Vector store backend chosen at runtime
pub enum StoreBackend {
    Local(LocalStore),
    Qdrant(QdrantStore),
}

impl VectorStore for StoreBackend {
    async fn rebuild(
        &mut self,
        manifest: IndexManifest,
        records: Vec<IndexedRecord>,
    ) -> Result<usize> {
        match self {
            StoreBackend::Local(local) => local.rebuild(manifest, records).await,
            StoreBackend::Qdrant(qdrant) => qdrant.rebuild(manifest, records).await,
        }
    }

    async fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<SearchHit>> {
        match self {
            StoreBackend::Local(local) => local.nearest(query, k).await,
            StoreBackend::Qdrant(qdrant) => qdrant.nearest(query, k).await,
        }
    }

    async fn stored_manifest(&self) -> Result<Option<IndexManifest>> {
        match self {
            StoreBackend::Local(local) => local.stored_manifest().await,
            StoreBackend::Qdrant(qdrant) => qdrant.stored_manifest().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manifest() -> IndexManifest {
        IndexManifest {
            model_id: "test-model".to_string(),
            dimension: 2,
        }
    }

    fn record(id: u64, text: &str, values: [f32; 2]) -> IndexedRecord {
        IndexedRecord {
            id,
            chunk: TextChunk {
                text: text.to_string(),
                source: "data/guide.txt".to_string(),
                chunk_index: id as usize,
                start_position: 0,
            },
            embedding: Embedding::from(values.to_vec()),
        }
    }

    fn texts(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|hit| hit.chunk.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_missing_store_is_distinct_from_empty() {
        let dir = tempdir().unwrap();
        let query = Embedding::from(vec![1.0, 0.0]);

        let store = LocalStore::load(dir.path().join("chromadb")).unwrap();
        assert!(!store.exists());
        let err = store.nearest(&query, 3).await.unwrap_err();
        assert!(matches!(err, RagError::MissingPersistedStore(_)));

        let mut store = LocalStore::empty(dir.path().join("chromadb"));
        assert_eq!(store.rebuild(manifest(), Vec::new()).await.unwrap(), 0);
        assert!(store.nearest(&query, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance_and_limits() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::empty(dir.path());
        store
            .rebuild(
                manifest(),
                vec![
                    record(0, "far", [0.0, 1.0]),
                    record(1, "near", [1.0, 0.1]),
                    record(2, "middle", [1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.nearest(&Embedding::from(vec![1.0, 0.0]), 2).await.unwrap();

        assert_eq!(texts(&hits), vec!["near", "middle"]);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::empty(dir.path());
        store
            .rebuild(
                manifest(),
                vec![
                    record(0, "first", [1.0, 0.0]),
                    record(1, "other", [0.0, 1.0]),
                    record(2, "second", [2.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.nearest(&Embedding::from(vec![3.0, 0.0]), 3).await.unwrap();
        assert_eq!(texts(&hits), vec!["first", "second", "other"]);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_and_persists() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::empty(dir.path());
        store
            .rebuild(manifest(), vec![record(0, "old", [1.0, 0.0])])
            .await
            .unwrap();
        store
            .rebuild(
                manifest(),
                vec![record(0, "new", [1.0, 0.0]), record(1, "newer", [0.0, 1.0])],
            )
            .await
            .unwrap();

        let reopened = LocalStore::load(dir.path()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.manifest(), Some(&manifest()));

        let hits = reopened
            .nearest(&Embedding::from(vec![1.0, 0.0]), 10)
            .await
            .unwrap();
        assert_eq!(texts(&hits), vec!["new", "newer"]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::empty(dir.path());

        let err = store
            .rebuild(
                manifest(),
                vec![IndexedRecord {
                    embedding: Embedding::from(vec![1.0, 0.0, 0.0]),
                    ..record(0, "bad", [0.0, 0.0])
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));

        store
            .rebuild(manifest(), vec![record(0, "ok", [1.0, 0.0])])
            .await
            .unwrap();
        let err = store
            .nearest(&Embedding::from(vec![1.0, 0.0, 0.0]), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));
    }
}
