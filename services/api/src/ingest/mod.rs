//! services/api/src/ingest/mod.rs
//!
//! The document ingestion pipeline: parse an uploaded PDF into pages, split
//! page text into overlapping chunks with provenance metadata, and write
//! them to the vector index. Failures are isolated per file so one corrupt
//! upload never aborts its siblings.

pub mod pdf;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rag_chat_core::chunk::{split_with_overlap, ChunkingConfig};
use rag_chat_core::domain::{ChunkMetadata, DocumentChunk};
use rag_chat_core::ports::{PortResult, VectorIndexService};
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::uploads::UploadStore;
pub use pdf::{PdfExtractBackend, PdfTextExtractor};

/// One file handed to the batch pipeline: its user-visible name and where
/// the upload landed on disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub path: PathBuf,
}

/// Per-file outcome inside a batch report.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileIngestResult {
    pub file_name: String,
    pub chunks: usize,
    pub status: IngestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Failed,
}

/// The aggregate outcome of one batch upload.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub total_chunks: usize,
    pub files: Vec<FileIngestResult>,
}

impl IngestReport {
    pub fn any_succeeded(&self) -> bool {
        self.files.iter().any(|f| f.status == IngestStatus::Success)
    }

    pub fn all_succeeded(&self) -> bool {
        self.files.iter().all(|f| f.status == IngestStatus::Success)
    }
}

/// Orchestrates parsing, chunking, and indexing of uploaded documents.
pub struct IngestPipeline {
    index: Arc<dyn VectorIndexService>,
    extractor: Arc<dyn PdfTextExtractor>,
    chunking: ChunkingConfig,
}

impl IngestPipeline {
    pub fn new(
        index: Arc<dyn VectorIndexService>,
        extractor: Arc<dyn PdfTextExtractor>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            index,
            extractor,
            chunking,
        }
    }

    /// Ingests a batch of uploaded files sequentially. Each file's failure
    /// is isolated; the report carries one entry per input file plus the
    /// aggregate chunk count of the successes. Temp files are deleted on
    /// success and failure paths alike.
    pub async fn ingest_batch(
        &self,
        uploads: &UploadStore,
        files: Vec<UploadedFile>,
    ) -> IngestReport {
        let mut results = Vec::with_capacity(files.len());
        let mut total_chunks = 0;

        for file in files {
            let outcome = self.ingest_one(&file).await;
            uploads.remove(&file.path).await;

            match outcome {
                Ok(chunks) => {
                    info!(file = %file.original_name, chunks, "indexed document");
                    total_chunks += chunks;
                    results.push(FileIngestResult {
                        file_name: file.original_name,
                        chunks,
                        status: IngestStatus::Success,
                        error: None,
                    });
                }
                Err(e) => {
                    error!(file = %file.original_name, error = %e, "failed to ingest document");
                    results.push(FileIngestResult {
                        file_name: file.original_name,
                        chunks: 0,
                        status: IngestStatus::Failed,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        IngestReport {
            total_chunks,
            files: results,
        }
    }

    async fn ingest_one(&self, file: &UploadedFile) -> PortResult<usize> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| rag_chat_core::ports::PortError::Unexpected(e.to_string()))?;

        let pages = self.extractor.extract_pages(&bytes)?;
        let chunks = chunks_from_pages(&file.original_name, &pages, self.chunking);
        if chunks.is_empty() {
            return Err(rag_chat_core::ports::PortError::InvalidInput(format!(
                "no extractable text in {}",
                file.original_name
            )));
        }

        self.index.upsert_chunks(&chunks).await?;
        Ok(chunks.len())
    }
}

/// Splits page texts into chunks and attaches provenance metadata: source
/// file, 1-based page number, zero-based chunk index strictly increasing
/// across the whole document, total chunk count, ingestion timestamp.
pub fn chunks_from_pages(
    source_file: &str,
    pages: &[String],
    cfg: ChunkingConfig,
) -> Vec<DocumentChunk> {
    let uploaded_at = Utc::now();

    let mut pieces: Vec<(Option<u32>, String)> = Vec::new();
    if pages.len() == 1 {
        // Single-page extraction usually means page structure was lost;
        // do not claim a page number we cannot stand behind.
        for piece in split_with_overlap(&pages[0], cfg) {
            pieces.push((None, piece));
        }
    } else {
        for (page_idx, page_text) in pages.iter().enumerate() {
            for piece in split_with_overlap(page_text, cfg) {
                pieces.push((Some(page_idx as u32 + 1), piece));
            }
        }
    }

    let total_chunks = pieces.len() as u32;
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (page_number, content))| DocumentChunk {
            id: format!("{}-{}-{}", source_file, i, Uuid::new_v4()),
            content,
            metadata: ChunkMetadata {
                source_file: source_file.to_string(),
                page_number,
                chunk_index: i as u32,
                total_chunks,
                uploaded_at,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_chat_core::domain::RetrievedDocument;
    use rag_chat_core::ports::PortError;
    use std::sync::Mutex;

    struct RecordingIndex {
        upserted: Mutex<Vec<DocumentChunk>>,
    }

    #[async_trait]
    impl VectorIndexService for RecordingIndex {
        async fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> PortResult<()> {
            self.upserted.lock().unwrap().extend_from_slice(chunks);
            Ok(())
        }

        async fn similarity_search(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> PortResult<Vec<RetrievedDocument>> {
            Ok(Vec::new())
        }
    }

    /// Treats the bytes as UTF-8 with pages separated by form feeds;
    /// anything starting with "CORRUPT" fails to parse.
    struct FakeExtractor;

    impl PdfTextExtractor for FakeExtractor {
        fn extract_pages(&self, bytes: &[u8]) -> PortResult<Vec<String>> {
            let text = String::from_utf8_lossy(bytes);
            if text.starts_with("CORRUPT") {
                return Err(PortError::InvalidInput("failed to parse PDF".to_string()));
            }
            Ok(text.split('\x0c').map(str::to_string).collect())
        }
    }

    fn small_chunks() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 40,
            overlap: 10,
        }
    }

    #[test]
    fn chunk_indices_increase_strictly_across_pages() {
        let pages = vec![
            "the camping rule requires three nights under canvas per year".to_string(),
            "community service requires thirty hours of documented work".to_string(),
        ];
        let chunks = chunks_from_pages("rules.pdf", &pages, small_chunks());

        assert!(chunks.len() >= 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i as u32);
            assert_eq!(chunk.metadata.source_file, "rules.pdf");
            assert_eq!(chunk.metadata.total_chunks, chunks.len() as u32);
        }
        // Page numbers are 1-based and present for multi-page documents.
        assert_eq!(chunks.first().unwrap().metadata.page_number, Some(1));
        assert_eq!(chunks.last().unwrap().metadata.page_number, Some(2));
    }

    #[test]
    fn single_page_documents_omit_page_numbers() {
        let pages = vec!["one flat page of text".to_string()];
        let chunks = chunks_from_pages("flat.pdf", &pages, ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.page_number, None);
    }

    async fn write_upload(
        store: &UploadStore,
        name: &str,
        contents: &str,
    ) -> UploadedFile {
        let path = store
            .save(crate::uploads::UploadKind::Pdf, name, contents.as_bytes())
            .await
            .unwrap();
        UploadedFile {
            original_name: name.to_string(),
            path,
        }
    }

    #[tokio::test]
    async fn corrupt_file_is_isolated_from_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path().to_path_buf());
        let index = Arc::new(RecordingIndex {
            upserted: Mutex::new(Vec::new()),
        });
        let pipeline = IngestPipeline::new(index.clone(), Arc::new(FakeExtractor), small_chunks());

        let files = vec![
            write_upload(&store, "a.pdf", "first page of document a\x0csecond page").await,
            write_upload(&store, "broken.pdf", "CORRUPT bytes").await,
            write_upload(&store, "c.pdf", "a single page with enough text to chunk").await,
        ];
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();

        let report = pipeline.ingest_batch(&store, files).await;

        assert_eq!(report.files.len(), 3);
        let failed: Vec<_> = report
            .files
            .iter()
            .filter(|f| f.status == IngestStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_name, "broken.pdf");
        assert!(failed[0].error.is_some());

        // Aggregate counts only the successes, and they all hit the index.
        let succeeded_chunks: usize = report
            .files
            .iter()
            .filter(|f| f.status == IngestStatus::Success)
            .map(|f| f.chunks)
            .sum();
        assert_eq!(report.total_chunks, succeeded_chunks);
        assert_eq!(index.upserted.lock().unwrap().len(), succeeded_chunks);
        assert!(report.any_succeeded());
        assert!(!report.all_succeeded());

        // Temp files are gone on success and failure paths alike.
        for path in paths {
            assert!(!path.exists(), "temp file survived: {}", path.display());
        }
    }

    #[tokio::test]
    async fn empty_document_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path().to_path_buf());
        let index = Arc::new(RecordingIndex {
            upserted: Mutex::new(Vec::new()),
        });
        let pipeline = IngestPipeline::new(index, Arc::new(FakeExtractor), small_chunks());

        let files = vec![write_upload(&store, "empty.pdf", "   ").await];
        let report = pipeline.ingest_batch(&store, files).await;

        assert_eq!(report.total_chunks, 0);
        assert_eq!(report.files[0].status, IngestStatus::Failed);
    }
}
