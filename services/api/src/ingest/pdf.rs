//! services/api/src/ingest/pdf.rs
//!
//! PDF text extraction behind a small seam so the batch pipeline can be
//! exercised in tests without real PDF bytes.

use rag_chat_core::ports::{PortError, PortResult};

/// Extracts page texts from an uploaded document.
pub trait PdfTextExtractor: Send + Sync {
    /// One string per page, in page order. Pages with no extractable text
    /// come back empty and are skipped by the chunker.
    fn extract_pages(&self, bytes: &[u8]) -> PortResult<Vec<String>>;
}

/// The production extractor, backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractBackend;

impl PdfTextExtractor for PdfExtractBackend {
    fn extract_pages(&self, bytes: &[u8]) -> PortResult<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| PortError::InvalidInput(format!("failed to parse PDF: {e}")))
    }
}
