use crate::error::StoreError;
use crate::models::{ChunkMetadata, DocumentChunk, FileType, MetadataFilter, ScoredChunk};
use crate::traits::VectorBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

/// Qdrant REST client. Chunk text and provenance ride along as point
/// payload so search results can be rebuilt without a second lookup.
pub struct QdrantBackend {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantBackend {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), StoreError> {
        if self.vector_size != vector_size {
            return Err(StoreError::Request(format!(
                "configured vector size {} does not match requested {}",
                self.vector_size, vector_size
            )));
        }

        let existing = self.client.get(self.collection_url()).send().await?;
        if existing.status().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn upsert_chunks(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<Vec<String>, StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut ids = Vec::with_capacity(chunks.len());
        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(StoreError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.vector_size
                    )));
                }

                let point_id = Uuid::new_v4().to_string();
                ids.push(point_id.clone());

                Ok(json!({
                    "id": point_id,
                    "vector": embedding,
                    "payload": chunk_payload(chunk),
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        if points.is_empty() {
            return Ok(ids);
        }

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(ids)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if query_vector.len() != self.vector_size {
            return Err(StoreError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let mut body = json!({
            "vector": query_vector,
            "limit": k,
            "with_payload": true,
        });
        if let Some(conditions) = filter.and_then(build_filter) {
            body["filter"] = conditions;
        }

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits.iter().filter_map(chunk_from_hit).collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let response = self
            .client
            .post(format!("{}/points/count", self.collection_url()))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "count missing from response".to_string(),
            })
    }

    async fn drop_collection(&self) -> Result<(), StoreError> {
        let response = self.client.delete(self.collection_url()).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

fn chunk_payload(chunk: &DocumentChunk) -> Value {
    json!({
        "chunk_id": chunk.chunk_id,
        "chunk_index": chunk.chunk_index,
        "text": chunk.text,
        "source_path": chunk.metadata.source_path,
        "file_name": chunk.metadata.file_name,
        "file_type": chunk.metadata.file_type.as_str(),
    })
}

fn build_filter(filter: &MetadataFilter) -> Option<Value> {
    let mut conditions = Vec::new();

    if let Some(file_name) = &filter.file_name {
        conditions.push(json!({ "key": "file_name", "match": { "value": file_name } }));
    }
    if let Some(file_type) = filter.file_type {
        conditions.push(json!({ "key": "file_type", "match": { "value": file_type.as_str() } }));
    }
    if let Some(source_path) = &filter.source_path {
        conditions.push(json!({ "key": "source_path", "match": { "value": source_path } }));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(json!({ "must": conditions }))
    }
}

fn chunk_from_hit(hit: &Value) -> Option<ScoredChunk> {
    let payload = hit.pointer("/payload")?;
    let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

    let file_type = payload
        .pointer("/file_type")
        .and_then(Value::as_str)
        .and_then(FileType::from_extension)?;

    Some(ScoredChunk {
        chunk: DocumentChunk {
            chunk_id: payload
                .pointer("/chunk_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            text: payload
                .pointer("/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            chunk_index: payload
                .pointer("/chunk_index")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
            metadata: ChunkMetadata {
                source_path: payload
                    .pointer("/source_path")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                file_name: payload
                    .pointer("/file_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                file_type,
            },
        },
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_builds_no_conditions() {
        assert!(build_filter(&MetadataFilter::default()).is_none());
    }

    #[test]
    fn filter_fields_become_match_conditions() {
        let filter = MetadataFilter {
            file_name: Some("a.txt".to_string()),
            file_type: Some(FileType::Text),
            source_path: None,
        };

        let value = build_filter(&filter).expect("conditions expected");
        let must = value.pointer("/must").and_then(Value::as_array).unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(
            must[0].pointer("/match/value").and_then(Value::as_str),
            Some("a.txt")
        );
    }

    #[test]
    fn search_hits_are_rebuilt_from_payload() {
        let hit = json!({
            "id": "9d3f8d1c-0000-0000-0000-000000000000",
            "score": 0.87,
            "payload": {
                "chunk_id": "abc123",
                "chunk_index": 2,
                "text": "The sky is blue.",
                "source_path": "/tmp/sky.txt",
                "file_name": "sky.txt",
                "file_type": "txt",
            },
        });

        let scored = chunk_from_hit(&hit).expect("hit should parse");
        assert_eq!(scored.chunk.chunk_id, "abc123");
        assert_eq!(scored.chunk.chunk_index, 2);
        assert_eq!(scored.chunk.metadata.file_type, FileType::Text);
        assert!((scored.score - 0.87).abs() < f64::EPSILON);
    }

    #[test]
    fn hit_without_payload_is_dropped() {
        assert!(chunk_from_hit(&json!({ "id": "x", "score": 0.5 })).is_none());
    }
}
