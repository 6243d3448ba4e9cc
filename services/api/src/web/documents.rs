//! services/api/src/web/documents.rs
//!
//! Admin document upload into the vector index, plus the public
//! retrieval probe used to sanity-check what the index returns.

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rag_chat_core::domain::RetrievedDocument;
use rag_chat_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::ingest::{IngestReport, UploadedFile};
use crate::uploads::UploadKind;
use crate::web::state::AppState;
use crate::web::Envelope;

/// Most files one upload request may carry.
const MAX_FILES_PER_BATCH: usize = 10;

/// Per-file size cap, enforced after multipart decoding.
const MAX_PDF_BYTES: usize = 10 * 1024 * 1024;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SearchParams {
    /// The probe query text.
    pub q: String,
}

#[derive(Serialize, ToSchema)]
pub struct SearchData {
    #[schema(value_type = Vec<Object>)]
    pub sources: Vec<RetrievedDocument>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /pinecone/pdf - Index a batch of PDF files. Admin only.
///
/// Accepts multipart/form-data with up to ten `pdfFiles` parts. Each file
/// is parsed, chunked, embedded, and upserted independently; the report
/// lists every file's outcome. The response is 200 when at least one file
/// was indexed, 500 when all of them failed.
#[utoipa::path(
    post,
    path = "/api/v1/pinecone/pdf",
    request_body(content_type = "multipart/form-data", description = "The PDF files to index."),
    responses(
        (status = 200, description = "Batch processed", body = IngestReport),
        (status = 400, description = "No files, too many files, or a file over the size cap"),
        (status = 401, description = "Invalid or missing token"),
        (status = 403, description = "Caller is not an admin"),
        (status = 500, description = "Every file in the batch failed")
    ),
    security(("bearer_auth" = [])),
    tag = "documents"
)]
pub async fn upload_pdfs_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut files: Vec<UploadedFile> = Vec::new();

    // Any failure while the batch is still being read, whether a rejected
    // file or a broken stream, must delete what already landed on disk.
    if let Err(e) = collect_batch(&state, &mut multipart, &mut files).await {
        remove_all(&state, &files).await;
        return Err(e);
    }

    if files.is_empty() {
        return Err(ApiError::Port(PortError::InvalidInput(
            "Upload at least one PDF file under the pdfFiles field".to_string(),
        )));
    }

    info!(files = files.len(), "processing document batch");
    let report = state.ingest.ingest_batch(&state.uploads, files).await;

    let status = if report.any_succeeded() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = format!(
        "Indexed {} chunks from {} of {} files",
        report.total_chunks,
        report
            .files
            .iter()
            .filter(|f| f.status == crate::ingest::IngestStatus::Success)
            .count(),
        report.files.len()
    );

    Ok((status, Json(Envelope::new(&message, report))))
}

/// GET /pinecone/search - Run a raw top-K retrieval probe.
///
/// No auth and no generation: this exists to inspect what the index
/// would hand the chat pipeline for a given query.
#[utoipa::path(
    get,
    path = "/api/v1/pinecone/search",
    params(("q" = String, Query, description = "The probe query text.")),
    responses(
        (status = 200, description = "Nearest chunks with scores", body = SearchData),
        (status = 400, description = "Missing or empty query"),
        (status = 500, description = "Retrieval failed")
    ),
    tag = "documents"
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::Port(PortError::InvalidInput(
            "Query parameter q is required".to_string(),
        )));
    }

    let results = state
        .index
        .similarity_search(query, state.config.retrieval_top_k)
        .await?;

    Ok(Json(Envelope::new(
        "Search results",
        SearchData { sources: results },
    )))
}

/// Drains the `pdfFiles` parts into temp files, appending each saved file
/// to `files` so the caller can reclaim them if this returns an error.
async fn collect_batch(
    state: &AppState,
    multipart: &mut Multipart,
    files: &mut Vec<UploadedFile>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("pdfFiles") {
            continue;
        }
        if files.len() >= MAX_FILES_PER_BATCH {
            return Err(ApiError::Port(PortError::InvalidInput(format!(
                "At most {MAX_FILES_PER_BATCH} files per upload"
            ))));
        }

        let original_name = field.file_name().unwrap_or("document.pdf").to_string();
        let bytes = field.bytes().await?;
        if bytes.len() > MAX_PDF_BYTES {
            return Err(ApiError::Port(PortError::InvalidInput(format!(
                "{original_name} exceeds the {} MB file size limit",
                MAX_PDF_BYTES / (1024 * 1024)
            ))));
        }

        let path = state
            .uploads
            .save(UploadKind::Pdf, &original_name, &bytes)
            .await?;
        files.push(UploadedFile {
            original_name,
            path,
        });
    }

    Ok(())
}

async fn remove_all(state: &AppState, files: &[UploadedFile]) {
    for file in files {
        state.uploads.remove(&file.path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use std::path::Path;

    const BOUNDARY: &str = "pdf-batch-test-boundary";

    fn pdf_part(body: &mut Vec<u8>, file_name: &str, content: &[u8]) {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"pdfFiles\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }

    fn close(body: &mut Vec<u8>) {
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    }

    async fn multipart_from(body: Vec<u8>) -> Multipart {
        let request = Request::builder()
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    fn stored_pdf_count(upload_root: &Path) -> usize {
        match std::fs::read_dir(upload_root.join("pdf")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn oversize_file_reclaims_already_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _db) = test_support::state_with_uploads(dir.path().to_path_buf());

        let mut body = Vec::new();
        pdf_part(&mut body, "small.pdf", b"%PDF-1.4 tiny");
        pdf_part(&mut body, "huge.pdf", &vec![0u8; MAX_PDF_BYTES + 1]);
        close(&mut body);

        let response = test_support::respond(
            upload_pdfs_handler(State(state), multipart_from(body).await).await,
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stored_pdf_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn truncated_stream_reclaims_already_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _db) = test_support::state_with_uploads(dir.path().to_path_buf());

        // One complete part, then a second that cuts off mid-body with no
        // closing boundary, as an aborted client upload would.
        let mut body = Vec::new();
        pdf_part(&mut body, "first.pdf", b"%PDF-1.4 tiny");
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"pdfFiles\"; filename=\"cut.pdf\"\r\n\
                 Content-Type: application/pdf\r\n\r\n%PDF-1.4 interru"
            )
            .as_bytes(),
        );

        let response = test_support::respond(
            upload_pdfs_handler(State(state), multipart_from(body).await).await,
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stored_pdf_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _db) = test_support::state_with_uploads(dir.path().to_path_buf());

        let mut body = Vec::new();
        close(&mut body);

        let response = test_support::respond(
            upload_pdfs_handler(State(state), multipart_from(body).await).await,
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
