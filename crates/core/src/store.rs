use crate::embeddings::Embeddings;
use crate::error::StoreError;
use crate::models::{CollectionInfo, DocumentChunk, MetadataFilter, ScoredChunk};
use crate::traits::{Retriever, VectorBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Marker file recording that the collection behind a persist directory was
/// initialized; its presence drives create-if-absent-else-load.
pub const COLLECTION_MANIFEST: &str = "collection.json";

pub const DEFAULT_COLLECTION_NAME: &str = "qa_documents";

/// Default number of matches handed to the QA layer per question.
pub const DEFAULT_SEARCH_K: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub collection_name: String,
    pub embedding_model: String,
    pub vector_size: usize,
    pub created_at: DateTime<Utc>,
}

/// Wraps the external vector database and the embedding endpoint behind the
/// add/search/delete surface the QA chain needs.
///
/// Insertion errors propagate (silent partial writes would corrupt
/// retrieval); search errors soft-fail to an empty result.
pub struct VectorStoreManager<B, E> {
    backend: B,
    embeddings: E,
    persist_directory: PathBuf,
    collection_name: String,
    embedding_model: String,
}

impl<B, E> VectorStoreManager<B, E>
where
    B: VectorBackend,
    E: Embeddings,
{
    /// Create-or-load: when the manifest marker is present the existing
    /// collection is loaded (and must match the configured name and
    /// embedding model); otherwise the collection is created and the marker
    /// written. Initialization errors propagate.
    pub async fn initialize(
        backend: B,
        embeddings: E,
        persist_directory: impl Into<PathBuf>,
        collection_name: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let manager = Self {
            backend,
            embeddings,
            persist_directory: persist_directory.into(),
            collection_name: collection_name.into(),
            embedding_model: embedding_model.into(),
        };

        fs::create_dir_all(&manager.persist_directory)?;
        let vector_size = manager.embeddings.vector_size();

        if Self::collection_exists(&manager.persist_directory) {
            let manifest = manager.read_manifest()?;
            let expected = manager.manifest_identity(vector_size);
            let found = format!(
                "{}/{}/{}",
                manifest.collection_name, manifest.embedding_model, manifest.vector_size
            );
            if expected != found {
                return Err(StoreError::ManifestMismatch { expected, found });
            }

            info!(
                directory = %manager.persist_directory.display(),
                collection = %manager.collection_name,
                "loading existing vector store"
            );
            manager.backend.ensure_collection(vector_size).await?;
        } else {
            info!(
                directory = %manager.persist_directory.display(),
                collection = %manager.collection_name,
                "creating new vector store"
            );
            manager.backend.ensure_collection(vector_size).await?;
            manager.write_manifest(vector_size)?;
        }

        Ok(manager)
    }

    /// Whether a persist directory already holds an initialized collection.
    pub fn collection_exists(persist_directory: &Path) -> bool {
        persist_directory.join(COLLECTION_MANIFEST).exists()
    }

    /// Embed and store chunks; returns the assigned point ids. Embedding and
    /// storage errors propagate to the caller.
    pub async fn add_documents(&self, chunks: &[DocumentChunk]) -> Result<Vec<String>, StoreError> {
        if chunks.is_empty() {
            warn!("no documents provided to add");
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embeddings.embed_batch(&texts).await?;
        let ids = self.backend.upsert_chunks(chunks, &embeddings).await?;

        info!(added = ids.len(), collection = %self.collection_name, "documents added");
        Ok(ids)
    }

    /// Top-k matches for a query; internal errors are logged and yield an
    /// empty vec.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<DocumentChunk> {
        self.similarity_search_with_score(query, k, filter)
            .await
            .into_iter()
            .map(|scored| scored.chunk)
            .collect()
    }

    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<ScoredChunk> {
        match self.search_scored(query, k, filter).await {
            Ok(matches) => matches,
            Err(error) => {
                error!(reason = %error, "similarity search failed");
                Vec::new()
            }
        }
    }

    /// Error-propagating search used by the retriever seam.
    pub async fn search_scored(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let query_vector = self.embeddings.embed_query(query).await?;
        self.backend.search(&query_vector, k, filter).await
    }

    pub async fn get_collection_info(&self) -> Result<CollectionInfo, StoreError> {
        let document_count = self.backend.count().await?;

        Ok(CollectionInfo {
            collection_name: self.collection_name.clone(),
            document_count,
            persist_directory: self.persist_directory.display().to_string(),
            embedding_model: self.embedding_model.clone(),
            vector_size: self.embeddings.vector_size(),
        })
    }

    /// Destructive: drop every persisted vector, then immediately recreate
    /// an empty collection and rewrite the marker.
    pub async fn delete_collection(&self) -> Result<(), StoreError> {
        let vector_size = self.embeddings.vector_size();

        self.backend.drop_collection().await?;
        self.backend.ensure_collection(vector_size).await?;
        self.write_manifest(vector_size)?;

        info!(collection = %self.collection_name, "collection deleted and recreated");
        Ok(())
    }

    fn manifest_path(&self) -> PathBuf {
        self.persist_directory.join(COLLECTION_MANIFEST)
    }

    fn manifest_identity(&self, vector_size: usize) -> String {
        format!(
            "{}/{}/{}",
            self.collection_name, self.embedding_model, vector_size
        )
    }

    fn read_manifest(&self) -> Result<CollectionManifest, StoreError> {
        let raw = fs::read_to_string(self.manifest_path())?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_manifest(&self, vector_size: usize) -> Result<(), StoreError> {
        let manifest = CollectionManifest {
            collection_name: self.collection_name.clone(),
            embedding_model: self.embedding_model.clone(),
            vector_size,
            created_at: Utc::now(),
        };

        fs::write(self.manifest_path(), serde_json::to_string_pretty(&manifest)?)?;
        Ok(())
    }
}

/// Bounded-k retriever view over a shared store, default k = 4.
pub struct StoreRetriever<B, E> {
    store: Arc<VectorStoreManager<B, E>>,
    k: usize,
}

impl<B, E> VectorStoreManager<B, E>
where
    B: VectorBackend,
    E: Embeddings,
{
    pub fn as_retriever(self: Arc<Self>, k: Option<usize>) -> StoreRetriever<B, E> {
        StoreRetriever {
            store: self,
            k: k.unwrap_or(DEFAULT_SEARCH_K),
        }
    }
}

#[async_trait]
impl<B, E> Retriever for StoreRetriever<B, E>
where
    B: VectorBackend,
    E: Embeddings,
{
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, StoreError> {
        self.store.search_scored(query, self.k, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, FileType};
    use std::sync::Mutex;
    use tempfile::tempdir;

    const TEST_DIMENSIONS: usize = 26;

    /// Letter-frequency embedder: deterministic and good enough for cosine
    /// ranking over toy sentences.
    struct LetterFrequencyEmbedder;

    impl LetterFrequencyEmbedder {
        fn embed(text: &str) -> Vec<f32> {
            let mut vector = vec![0f32; TEST_DIMENSIONS];
            for letter in text.to_lowercase().chars() {
                if letter.is_ascii_lowercase() {
                    vector[(letter as u8 - b'a') as usize] += 1.0;
                }
            }
            let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            if magnitude > 0.0 {
                for value in &mut vector {
                    *value /= magnitude;
                }
            }
            vector
        }
    }

    #[async_trait]
    impl Embeddings for LetterFrequencyEmbedder {
        fn vector_size(&self) -> usize {
            TEST_DIMENSIONS
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
            Ok(texts.iter().map(|text| Self::embed(text)).collect())
        }
    }

    #[derive(Default)]
    struct InMemoryBackend {
        points: Mutex<Vec<(DocumentChunk, Vec<f32>)>>,
    }

    fn cosine(left: &[f32], right: &[f32]) -> f64 {
        left.iter()
            .zip(right.iter())
            .map(|(a, b)| (a * b) as f64)
            .sum()
    }

    #[async_trait]
    impl VectorBackend for InMemoryBackend {
        async fn ensure_collection(&self, _vector_size: usize) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert_chunks(
            &self,
            chunks: &[DocumentChunk],
            embeddings: &[Vec<f32>],
        ) -> Result<Vec<String>, StoreError> {
            let mut points = self.points.lock().unwrap();
            let mut ids = Vec::new();
            for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
                ids.push(format!("point-{}", points.len()));
                points.push((chunk.clone(), embedding.clone()));
            }
            Ok(ids)
        }

        async fn search(
            &self,
            query_vector: &[f32],
            k: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<ScoredChunk>, StoreError> {
            let points = self.points.lock().unwrap();
            let mut scored: Vec<ScoredChunk> = points
                .iter()
                .filter(|(chunk, _)| match filter {
                    Some(filter) => {
                        filter
                            .file_name
                            .as_ref()
                            .map_or(true, |name| *name == chunk.metadata.file_name)
                            && filter
                                .file_type
                                .map_or(true, |file_type| file_type == chunk.metadata.file_type)
                            && filter
                                .source_path
                                .as_ref()
                                .map_or(true, |path| *path == chunk.metadata.source_path)
                    }
                    None => true,
                })
                .map(|(chunk, embedding)| ScoredChunk {
                    chunk: chunk.clone(),
                    score: cosine(query_vector, embedding),
                })
                .collect();

            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.truncate(k);
            Ok(scored)
        }

        async fn count(&self) -> Result<u64, StoreError> {
            Ok(self.points.lock().unwrap().len() as u64)
        }

        async fn drop_collection(&self) -> Result<(), StoreError> {
            self.points.lock().unwrap().clear();
            Ok(())
        }
    }

    /// Backend whose data-path calls all fail; initialization succeeds.
    struct FailingBackend;

    #[async_trait]
    impl VectorBackend for FailingBackend {
        async fn ensure_collection(&self, _vector_size: usize) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert_chunks(
            &self,
            _chunks: &[DocumentChunk],
            _embeddings: &[Vec<f32>],
        ) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Request("backend down".to_string()))
        }

        async fn search(
            &self,
            _query_vector: &[f32],
            _k: usize,
            _filter: Option<&MetadataFilter>,
        ) -> Result<Vec<ScoredChunk>, StoreError> {
            Err(StoreError::Request("backend down".to_string()))
        }

        async fn count(&self) -> Result<u64, StoreError> {
            Err(StoreError::Request("backend down".to_string()))
        }

        async fn drop_collection(&self) -> Result<(), StoreError> {
            Err(StoreError::Request("backend down".to_string()))
        }
    }

    fn chunk(text: &str, file_name: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: format!("{file_name}:{text}"),
            text: text.to_string(),
            chunk_index: 0,
            metadata: ChunkMetadata {
                source_path: format!("/tmp/{file_name}"),
                file_name: file_name.to_string(),
                file_type: FileType::Text,
            },
        }
    }

    async fn manager_at(
        directory: &Path,
    ) -> VectorStoreManager<InMemoryBackend, LetterFrequencyEmbedder> {
        VectorStoreManager::initialize(
            InMemoryBackend::default(),
            LetterFrequencyEmbedder,
            directory,
            DEFAULT_COLLECTION_NAME,
            "test-embeddings",
        )
        .await
        .expect("initialization should succeed")
    }

    #[tokio::test]
    async fn initialization_writes_the_manifest_marker() {
        let dir = tempdir().unwrap();
        assert!(!VectorStoreManager::<InMemoryBackend, LetterFrequencyEmbedder>::collection_exists(
            dir.path()
        ));

        let _manager = manager_at(dir.path()).await;
        assert!(VectorStoreManager::<InMemoryBackend, LetterFrequencyEmbedder>::collection_exists(
            dir.path()
        ));
    }

    #[tokio::test]
    async fn reinitialization_loads_the_existing_collection() {
        let dir = tempdir().unwrap();
        let _first = manager_at(dir.path()).await;
        let _second = manager_at(dir.path()).await;
    }

    #[tokio::test]
    async fn mismatched_manifest_is_a_hard_error() {
        let dir = tempdir().unwrap();
        let _first = manager_at(dir.path()).await;

        let result = VectorStoreManager::initialize(
            InMemoryBackend::default(),
            LetterFrequencyEmbedder,
            dir.path(),
            DEFAULT_COLLECTION_NAME,
            "different-embeddings",
        )
        .await;

        assert!(matches!(result, Err(StoreError::ManifestMismatch { .. })));
    }

    #[tokio::test]
    async fn adding_the_same_document_twice_keeps_both_entries() {
        let dir = tempdir().unwrap();
        let manager = manager_at(dir.path()).await;
        let doc = chunk("The sky is blue.", "sky.txt");

        manager.add_documents(&[doc.clone()]).await.unwrap();
        manager.add_documents(&[doc]).await.unwrap();

        let info = manager.get_collection_info().await.unwrap();
        assert_eq!(info.document_count, 2);

        let hits = manager.similarity_search("sky", 4, None).await;
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn sky_question_finds_the_sky_chunk() {
        let dir = tempdir().unwrap();
        let manager = manager_at(dir.path()).await;
        manager
            .add_documents(&[chunk("The sky is blue.", "sky.txt")])
            .await
            .unwrap();

        let hits = manager
            .similarity_search("What color is the sky?", 1, None)
            .await;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "The sky is blue.");
    }

    #[tokio::test]
    async fn metadata_filter_constrains_matches() {
        let dir = tempdir().unwrap();
        let manager = manager_at(dir.path()).await;
        manager
            .add_documents(&[
                chunk("The sky is blue.", "sky.txt"),
                chunk("Grass is green.", "grass.txt"),
            ])
            .await
            .unwrap();

        let filter = MetadataFilter {
            file_name: Some("grass.txt".to_string()),
            ..Default::default()
        };
        let hits = manager.similarity_search("sky", 4, Some(&filter)).await;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.file_name, "grass.txt");
    }

    #[tokio::test]
    async fn delete_collection_resets_the_count_to_zero() {
        let dir = tempdir().unwrap();
        let manager = manager_at(dir.path()).await;
        manager
            .add_documents(&[chunk("The sky is blue.", "sky.txt")])
            .await
            .unwrap();

        manager.delete_collection().await.unwrap();

        let info = manager.get_collection_info().await.unwrap();
        assert_eq!(info.document_count, 0);
        assert!(VectorStoreManager::<InMemoryBackend, LetterFrequencyEmbedder>::collection_exists(
            dir.path()
        ));
    }

    #[tokio::test]
    async fn empty_add_returns_no_ids() {
        let dir = tempdir().unwrap();
        let manager = manager_at(dir.path()).await;
        assert!(manager.add_documents(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_documents_propagates_backend_errors() {
        let dir = tempdir().unwrap();
        let manager = VectorStoreManager::initialize(
            FailingBackend,
            LetterFrequencyEmbedder,
            dir.path(),
            DEFAULT_COLLECTION_NAME,
            "test-embeddings",
        )
        .await
        .unwrap();

        let result = manager.add_documents(&[chunk("text", "a.txt")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn search_soft_fails_to_an_empty_result() {
        let dir = tempdir().unwrap();
        let manager = VectorStoreManager::initialize(
            FailingBackend,
            LetterFrequencyEmbedder,
            dir.path(),
            DEFAULT_COLLECTION_NAME,
            "test-embeddings",
        )
        .await
        .unwrap();

        assert!(manager.similarity_search("anything", 4, None).await.is_empty());
    }

    #[tokio::test]
    async fn retriever_defaults_to_four_matches() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(manager_at(dir.path()).await);
        let docs: Vec<DocumentChunk> = (0..6)
            .map(|index| chunk(&format!("sky fact number {index}"), "sky.txt"))
            .collect();
        manager.add_documents(&docs).await.unwrap();

        let retriever = Arc::clone(&manager).as_retriever(None);
        let hits = retriever.retrieve("sky").await.unwrap();
        assert_eq!(hits.len(), DEFAULT_SEARCH_K);

        let narrow = Arc::clone(&manager).as_retriever(Some(2));
        assert_eq!(narrow.retrieve("sky").await.unwrap().len(), 2);
    }
}
