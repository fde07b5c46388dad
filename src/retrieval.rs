use crate::chunking::TextChunk;
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use crate::store::{IndexManifest, IndexedRecord, SearchHit, VectorStore};
use log::debug;

/// Pairs an embedder with the store its vectors live in
pub struct Retriever<E, S> {
    embedder: E,
    store: S,
}

impl<E: Embedder, S: VectorStore> Retriever<E, S> {
    pub fn new(embedder: E, store: S) -> Self {
        Retriever { embedder, store }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist `chunks` with their `vectors`, replacing the previous index
    pub async fn index(&mut self, chunks: Vec<TextChunk>, vectors: Vec<Embedding>) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(RagError::retrieval(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                vectors.len()
            )));
        }

        let manifest = IndexManifest {
            model_id: self.embedder.model_id().to_string(),
            dimension: self.embedder.dimension(),
        };
        let records = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(idx, (chunk, embedding))| IndexedRecord {
                id: idx as u64,
                chunk,
                embedding,
            })
            .collect();

        self.store.rebuild(manifest, records).await
    }

    /// Embed `query` and return the `k` nearest chunks
    ///
    /// Fails when the index was built by a different embedding model.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if let Some(manifest) = self.store.stored_manifest().await? {
            if manifest.model_id != self.embedder.model_id() {
                return Err(RagError::retrieval(format!(
                    "index was built with {} but queries use {}; rebuild the index",
                    manifest.model_id,
                    self.embedder.model_id()
                )));
            }
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        let hits = self.store.nearest(&query_embedding, k).await?;
        debug!("Retrieved {} chunk(s) for query", hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use tempfile::tempdir;

    /// Embeds every text as the same 2-d vector under a configurable model id
    struct FixedEmbedder(&'static str);

    impl Embedder for FixedEmbedder {
        fn model_id(&self) -> &str {
            self.0
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|_| Embedding::from(vec![1.0, 0.0])).collect())
        }
    }

    fn chunk(text: &str) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            source: "data/apa.txt".to_string(),
            chunk_index: 0,
            start_position: 0,
        }
    }

    #[tokio::test]
    async fn test_search_with_same_model() {
        let dir = tempdir().unwrap();
        let mut retriever = Retriever::new(FixedEmbedder("model-a"), LocalStore::empty(dir.path()));
        let vectors = retriever
            .embedder()
            .embed_documents(&["Use a hanging indent.".to_string()])
            .await
            .unwrap();
        retriever
            .index(vec![chunk("Use a hanging indent.")], vectors)
            .await
            .unwrap();

        let retriever = Retriever::new(FixedEmbedder("model-a"), LocalStore::load(dir.path()).unwrap());
        let hits = retriever.search("hanging indent", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_search_rejects_other_model_of_same_dimension() {
        let dir = tempdir().unwrap();
        let mut retriever = Retriever::new(FixedEmbedder("model-a"), LocalStore::empty(dir.path()));
        retriever
            .index(vec![chunk("Use a hanging indent.")], vec![Embedding::from(vec![1.0, 0.0])])
            .await
            .unwrap();

        let retriever = Retriever::new(FixedEmbedder("model-b"), LocalStore::load(dir.path()).unwrap());
        let err = retriever.search("hanging indent", 3).await.unwrap_err();

        assert!(matches!(err, RagError::Retrieval(_)));
        assert!(err.to_string().contains("model-a"));
    }

    #[tokio::test]
    async fn test_index_rejects_count_mismatch() {
        let dir = tempdir().unwrap();
        let mut retriever = Retriever::new(FixedEmbedder("model-a"), LocalStore::empty(dir.path()));

        let err = retriever.index(vec![chunk("orphan")], Vec::new()).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval(_)));
    }
}
