pub mod qdrant;

pub use qdrant::QdrantBackend;
