use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Text-to-vector boundary. The embedding model itself is an external
/// collaborator reached over HTTP; no retry or backoff is applied locally.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Dimensionality of the vectors this embedder produces.
    fn vector_size(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| StoreError::BackendResponse {
            backend: "embeddings".to_string(),
            details: "empty embedding batch".to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-style `/embeddings` endpoint client.
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    vector_size: usize,
}

impl OpenAiEmbeddings {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let vector_size = dimensions_for(&model);
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model,
            vector_size,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    fn vector_size(&self) -> usize {
        self.vector_size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: EmbeddingsResponse = response.json().await?;
        collect_embeddings(payload, texts.len())
    }
}

/// Known dimensionalities of the OpenAI embedding families; unknown models
/// fall back to the ada-002 width.
fn dimensions_for(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3_072,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1_536,
        _ => 1_536,
    }
}

fn collect_embeddings(
    payload: EmbeddingsResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, StoreError> {
    let mut items = payload.data;
    if items.len() != expected {
        return Err(StoreError::BackendResponse {
            backend: "embeddings".to_string(),
            details: format!("expected {} embeddings, got {}", expected, items.len()),
        });
    }

    // The API documents no ordering guarantee; trust the index field.
    items.sort_by_key(|item| item.index);
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_report_their_width() {
        assert_eq!(dimensions_for("text-embedding-ada-002"), 1_536);
        assert_eq!(dimensions_for("text-embedding-3-small"), 1_536);
        assert_eq!(dimensions_for("text-embedding-3-large"), 3_072);
        assert_eq!(dimensions_for("mystery-model"), 1_536);
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let payload = EmbeddingsResponse {
            data: vec![
                EmbeddingItem {
                    index: 1,
                    embedding: vec![1.0],
                },
                EmbeddingItem {
                    index: 0,
                    embedding: vec![0.0],
                },
            ],
        };

        let vectors = collect_embeddings(payload, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn missing_embeddings_are_rejected() {
        let payload = EmbeddingsResponse {
            data: vec![EmbeddingItem {
                index: 0,
                embedding: vec![0.0],
            }],
        };

        assert!(collect_embeddings(payload, 2).is_err());
    }

    #[test]
    fn response_payload_deserializes() {
        let raw = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"model":"text-embedding-ada-002"}"#;
        let payload: EmbeddingsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.data.len(), 1);
        assert_eq!(payload.data[0].embedding, vec![0.1, 0.2]);
    }
}
