use crate::chunking::TextChunk;
use crate::config::non_empty;
use crate::embeddings::Embedding;
use crate::error::{RagError, Result};
use crate::store::{IndexManifest, IndexedRecord, SearchHit, VectorStore};
use log::{info, warn};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::collections::HashMap;

pub const DEFAULT_COLLECTION: &str = "owl_writing_guides";

/// Configuration for Qdrant
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

impl QdrantConfig {
    /// Read `QDRANT_URL` and friends; `None` when no URL is set
    pub fn from_lookup<F>(lookup: &F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = non_empty(lookup, "QDRANT_URL")?;
        let api_key = non_empty(lookup, "QDRANT_API_KEY");
        let collection = non_empty(lookup, "OWL_QDRANT_COLLECTION")
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        Some(QdrantConfig {
            url,
            api_key,
            collection,
        })
    }
}

/// Vector store backed by a Qdrant collection
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Create a new Qdrant client
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = if let Some(api_key) = config.api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder
            .build()
            .map_err(|e| RagError::config(format!("invalid Qdrant URL {}: {}", config.url, e)))?;

        Ok(QdrantStore {
            client,
            collection: config.collection,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.collection.clone())
            .await
            .map_err(|e| {
                RagError::retrieval(format!("Failed to check collection existence: {}", e))
            })
    }

    async fn recreate_collection(&self, dimension: usize) -> Result<()> {
        if self.collection_exists().await? {
            self.client
                .delete_collection(self.collection.clone())
                .await
                .map_err(|e| {
                    RagError::retrieval(format!(
                        "Failed to delete collection {}: {}",
                        self.collection, e
                    ))
                })?;
        }

        let create_collection = CreateCollectionBuilder::new(self.collection.clone())
            .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| {
                RagError::retrieval(format!(
                    "Failed to create collection {}: {}",
                    self.collection, e
                ))
            })?;

        Ok(())
    }
}

impl VectorStore for QdrantStore {
    async fn rebuild(
        &mut self,
        manifest: IndexManifest,
        records: Vec<IndexedRecord>,
    ) -> Result<usize> {
        self.recreate_collection(manifest.dimension).await?;

        let count = records.len();
        if count == 0 {
            return Ok(0);
        }

        let points = records
            .into_iter()
            .map(|record| {
                let payload = Payload::try_from(json!({
                    "text": record.chunk.text,
                    "source": record.chunk.source,
                    "chunk_index": record.chunk.chunk_index,
                    "start_position": record.chunk.start_position,
                    "model_id": manifest.model_id,
                    "dimension": manifest.dimension,
                }))
                .map_err(|e| RagError::retrieval(format!("invalid point payload: {}", e)))?;

                Ok(PointStruct::new(record.id, record.embedding.values, payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
            .await
            .map_err(|e| {
                RagError::retrieval(format!(
                    "Failed to upsert points in collection {}: {}",
                    self.collection, e
                ))
            })?;

        info!(
            "Stored {} points in Qdrant collection {}",
            count, self.collection
        );
        Ok(count)
    }

    async fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<SearchHit>> {
        if !self.collection_exists().await? {
            return Err(RagError::MissingPersistedStore(format!(
                "Qdrant collection {}",
                self.collection
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let search_request =
            SearchPointsBuilder::new(self.collection.clone(), query.values.clone(), k as u64)
                .with_payload(true);

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .map_err(|e| {
                RagError::retrieval(format!(
                    "Failed to search collection {}: {}",
                    self.collection, e
                ))
            })?;

        // Qdrant reports cosine similarity; convert to a distance
        Ok(search_response
            .result
            .into_iter()
            .filter_map(|scored_point| match chunk_from_payload(&scored_point.payload) {
                Some(chunk) => Some(SearchHit {
                    chunk,
                    distance: 1.0 - scored_point.score,
                }),
                None => {
                    warn!(
                        "Skipping point {:?} in {}: payload has no text",
                        scored_point.id, self.collection
                    );
                    None
                }
            })
            .collect())
    }

    async fn stored_manifest(&self) -> Result<Option<IndexManifest>> {
        if !self.collection_exists().await? {
            return Ok(None);
        }

        let scroll_response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(self.collection.clone())
                    .limit(1)
                    .with_payload(true),
            )
            .await
            .map_err(|e| {
                RagError::retrieval(format!(
                    "Failed to read collection {}: {}",
                    self.collection, e
                ))
            })?;

        Ok(scroll_response
            .result
            .first()
            .and_then(|point| manifest_from_payload(&point.payload)))
    }
}

fn manifest_from_payload(payload: &HashMap<String, Value>) -> Option<IndexManifest> {
    let model_id = payload.get("model_id")?.as_str()?;
    let dimension = payload.get("dimension")?.as_integer()?;

    Some(IndexManifest {
        model_id: model_id.to_string(),
        dimension: dimension as usize,
    })
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<TextChunk> {
    let text = payload.get("text")?.as_str()?;
    let source = payload
        .get("source")
        .and_then(|v| v.as_str())
        .cloned()
        .unwrap_or_default();
    let integer = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_integer())
            .map(|v| v as usize)
            .unwrap_or(0)
    };

    Some(TextChunk {
        text: text.to_string(),
        source,
        chunk_index: integer("chunk_index"),
        start_position: integer("start_position"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_url() {
        assert!(QdrantConfig::from_lookup(&|_: &str| None).is_none());

        let config = QdrantConfig::from_lookup(&|key: &str| match key {
            "QDRANT_URL" => Some("http://localhost:6334".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.collection, DEFAULT_COLLECTION);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_chunk_from_payload() {
        let payload: HashMap<String, Value> = HashMap::from([
            ("text".to_string(), Value::from("Use italics for book titles.")),
            ("source".to_string(), Value::from("data/mla.txt")),
            ("chunk_index".to_string(), Value::from(4i64)),
            ("start_position".to_string(), Value::from(1200i64)),
        ]);

        let chunk = chunk_from_payload(&payload).unwrap();
        assert_eq!(chunk.text, "Use italics for book titles.");
        assert_eq!(chunk.source, "data/mla.txt");
        assert_eq!(chunk.chunk_index, 4);
        assert_eq!(chunk.start_position, 1200);

        assert!(chunk_from_payload(&HashMap::new()).is_none());
    }

    #[test]
    fn test_manifest_from_payload() {
        let payload: HashMap<String, Value> = HashMap::from([
            ("text".to_string(), Value::from("Use italics for book titles.")),
            (
                "model_id".to_string(),
                Value::from("sentence-transformers/all-MiniLM-L6-v2"),
            ),
            ("dimension".to_string(), Value::from(384i64)),
        ]);

        let manifest = manifest_from_payload(&payload).unwrap();
        assert_eq!(manifest.model_id, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(manifest.dimension, 384);

        let mut legacy = payload.clone();
        legacy.remove("dimension");
        assert!(manifest_from_payload(&legacy).is_none());
    }
}
