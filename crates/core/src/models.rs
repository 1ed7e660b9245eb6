use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters of chunk text kept when a source is rendered for display.
pub const SNIPPET_DISPLAY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Text,
    Docx,
}

impl FileType {
    /// Map a file extension (without the dot) onto a supported format.
    /// Legacy `.doc` files go through the docx path.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "docx" | "doc" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Docx => "docx",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source_path: String,
    pub file_name: String,
    pub file_type: FileType,
}

/// Bounded-length text span cut from a source document. Immutable after
/// creation; belongs to exactly one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub text: String,
    pub chunk_index: u64,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSnippet {
    pub content: String,
    pub file_name: String,
    pub source_path: String,
    pub score: f64,
}

impl SourceSnippet {
    pub fn from_scored(scored: &ScoredChunk) -> Self {
        let text = &scored.chunk.text;
        let content = if text.chars().count() > SNIPPET_DISPLAY_CHARS {
            let truncated: String = text.chars().take(SNIPPET_DISPLAY_CHARS).collect();
            format!("{truncated}...")
        } else {
            text.clone()
        };

        Self {
            content,
            file_name: scored.chunk.metadata.file_name.clone(),
            source_path: scored.chunk.metadata.source_path.clone(),
            score: scored.score,
        }
    }
}

/// One question/answer turn as shown to the user. Never persisted; cleared
/// explicitly via `clear_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceSnippet>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

/// Outcome of asking a question. Question answering never returns an error
/// to the caller; failures arrive as the `Failed` variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    Answered {
        answer: String,
        sources: Vec<SourceSnippet>,
        timestamp: DateTime<Utc>,
    },
    Failed {
        message: String,
    },
}

impl AskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Answered { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub collection_name: String,
    pub document_count: u64,
    pub persist_directory: String,
    pub embedding_model: String,
    pub vector_size: usize,
}

/// Metadata equality filter applied during similarity search. Empty fields
/// do not constrain the search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataFilter {
    pub file_name: Option<String>,
    pub file_type: Option<FileType>,
    pub source_path: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none() && self.file_type.is_none() && self.source_path.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_accepts_legacy_doc() {
        assert_eq!(FileType::from_extension("PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_extension("doc"), Some(FileType::Docx));
        assert_eq!(FileType::from_extension("docx"), Some(FileType::Docx));
        assert_eq!(FileType::from_extension("md"), None);
    }

    #[test]
    fn snippet_truncates_long_chunks_for_display() {
        let scored = ScoredChunk {
            chunk: DocumentChunk {
                chunk_id: "c1".to_string(),
                text: "x".repeat(SNIPPET_DISPLAY_CHARS + 50),
                chunk_index: 0,
                metadata: ChunkMetadata {
                    source_path: "/tmp/a.txt".to_string(),
                    file_name: "a.txt".to_string(),
                    file_type: FileType::Text,
                },
            },
            score: 0.7,
        };

        let snippet = SourceSnippet::from_scored(&scored);
        assert!(snippet.content.ends_with("..."));
        assert_eq!(
            snippet.content.chars().count(),
            SNIPPET_DISPLAY_CHARS + 3
        );
        assert_eq!(snippet.file_name, "a.txt");
    }

    #[test]
    fn short_snippet_is_not_truncated() {
        let scored = ScoredChunk {
            chunk: DocumentChunk {
                chunk_id: "c2".to_string(),
                text: "short".to_string(),
                chunk_index: 0,
                metadata: ChunkMetadata {
                    source_path: "/tmp/a.txt".to_string(),
                    file_name: "a.txt".to_string(),
                    file_type: FileType::Text,
                },
            },
            score: 0.1,
        };

        assert_eq!(SourceSnippet::from_scored(&scored).content, "short");
    }
}
