use crate::error::StoreError;
use crate::models::{DocumentChunk, MetadataFilter, ScoredChunk};
use async_trait::async_trait;

/// External vector database client. The index itself lives in the database;
/// this boundary only forwards add/search/delete calls.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Create the collection if it does not exist yet. Idempotent.
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), StoreError>;

    /// Store chunks with their embeddings; returns the assigned point ids.
    async fn upsert_chunks(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<Vec<String>, StoreError>;

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Destructive, irreversible removal of every stored vector.
    async fn drop_collection(&self) -> Result<(), StoreError>;
}

/// Bounded-k search interface handed to the QA layer; the k bound is fixed
/// when the retriever is built. Errors propagate so the chain can convert
/// them into a failure outcome.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, StoreError>;
}
