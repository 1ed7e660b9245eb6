pub mod chat;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod loader;
pub mod memory;
pub mod models;
pub mod qa;
pub mod splitter;
pub mod store;
pub mod stores;
pub mod traits;

pub use chat::{ChatMessage, ChatModel, ChatRole, OpenAiChat, DEFAULT_CHAT_MODEL};
pub use embeddings::{Embeddings, OpenAiEmbeddings, DEFAULT_EMBEDDING_MODEL};
pub use error::{ChatError, IngestError, StoreError};
pub use extract::extract_text;
pub use loader::{discover_supported_files, DocumentLoader, LoadReport, SkippedFile};
pub use memory::{ConversationMemory, MemoryConfig};
pub use models::{
    AskOutcome, ChunkMetadata, CollectionInfo, ConversationEntry, DocumentChunk, FileType,
    MetadataFilter, ScoredChunk, SourceSnippet, SNIPPET_DISPLAY_CHARS,
};
pub use qa::{MemorySummary, QaChainManager, INVALID_QUESTION_MESSAGE};
pub use splitter::{split_text, SplitConfig};
pub use store::{
    StoreRetriever, VectorStoreManager, COLLECTION_MANIFEST, DEFAULT_COLLECTION_NAME,
    DEFAULT_SEARCH_K,
};
pub use stores::QdrantBackend;
pub use traits::{Retriever, VectorBackend};
