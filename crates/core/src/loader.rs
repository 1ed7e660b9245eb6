use crate::error::IngestError;
use crate::extract::extract_text;
use crate::models::{ChunkMetadata, DocumentChunk, FileType};
use crate::splitter::{split_text, SplitConfig};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct LoadReport {
    pub chunks: Vec<DocumentChunk>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Loads PDF, TXT, and DOCX files and splits them into overlapping chunks
/// tagged with provenance metadata.
///
/// Per-file problems are soft failures: they are logged and yield an empty
/// result so batch ingestion continues past unreadable files.
#[derive(Debug, Clone, Copy)]
pub struct DocumentLoader {
    split: SplitConfig,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
        }
    }
}

impl DocumentLoader {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        let split = SplitConfig {
            chunk_size,
            chunk_overlap,
        };
        split.validate()?;
        Ok(Self { split })
    }

    /// Load one document. Missing files, unsupported extensions, and parse
    /// errors are logged and produce an empty vec.
    pub fn load_single_document(&self, path: &Path) -> Vec<DocumentChunk> {
        match self.try_load(path) {
            Ok(chunks) => {
                info!(path = %path.display(), chunk_count = chunks.len(), "loaded document");
                chunks
            }
            Err(IngestError::UnsupportedFileType(extension)) => {
                warn!(path = %path.display(), extension = %extension, "unsupported file type");
                Vec::new()
            }
            Err(error) => {
                error!(path = %path.display(), reason = %error, "failed to load document");
                Vec::new()
            }
        }
    }

    /// Load every supported file under a directory, recursively. Missing or
    /// non-directory paths yield an empty vec.
    pub fn load_directory(&self, directory: &Path) -> Vec<DocumentChunk> {
        self.load_directory_report(directory).chunks
    }

    /// Like `load_directory`, but also reports which files were skipped and
    /// why.
    pub fn load_directory_report(&self, directory: &Path) -> LoadReport {
        if !directory.is_dir() {
            error!(path = %directory.display(), "directory not found");
            return LoadReport {
                chunks: Vec::new(),
                skipped_files: Vec::new(),
            };
        }

        let files = discover_supported_files(directory);
        if files.is_empty() {
            warn!(path = %directory.display(), "no supported documents in directory");
        }

        let mut chunks = Vec::new();
        let mut skipped_files = Vec::new();

        for path in files {
            match self.try_load(&path) {
                Ok(file_chunks) => chunks.extend(file_chunks),
                Err(error) => {
                    warn!(path = %path.display(), reason = %error, "skipping document");
                    skipped_files.push(SkippedFile {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        info!(
            directory = %directory.display(),
            chunk_count = chunks.len(),
            skipped = skipped_files.len(),
            "directory ingestion finished"
        );

        LoadReport {
            chunks,
            skipped_files,
        }
    }

    /// Load a caller-supplied list of files, skipping the ones that fail.
    pub fn load_multiple_files(&self, paths: &[PathBuf]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        for path in paths {
            chunks.extend(self.load_single_document(path));
        }
        chunks
    }

    fn try_load(&self, path: &Path) -> Result<Vec<DocumentChunk>, IngestError> {
        if !path.is_file() {
            return Err(IngestError::FileNotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default();

        let file_type = FileType::from_extension(extension)
            .ok_or_else(|| IngestError::UnsupportedFileType(extension.to_string()))?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
            .to_string();

        let metadata = ChunkMetadata {
            source_path: path.to_string_lossy().to_string(),
            file_name,
            file_type,
        };

        let text = extract_text(path, file_type)?;
        let pieces = split_text(&text, self.split)?;

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| DocumentChunk {
                chunk_id: make_chunk_id(&metadata.source_path, index as u64, &piece),
                text: piece,
                chunk_index: index as u64,
                metadata: metadata.clone(),
            })
            .collect())
    }
}

/// Recursively discover files with a supported extension, sorted for
/// deterministic ingestion order.
pub fn discover_supported_files(directory: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(directory)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| FileType::from_extension(extension).is_some());

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn make_chunk_id(source_path: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
