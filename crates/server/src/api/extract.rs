use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use invox_core::{ExtractedData, ExtractionError, OrchestratorError, UploadedImage};

use crate::state::AppState;

/// Envelope for the synchronous extraction endpoint. Errors use the same
/// shape with `success: false` so clients can branch on one field.
#[derive(Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<i64>,
}

impl ExtractResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            processing_time_ms: None,
        }
    }
}

/// Extract invoice data from an uploaded image without creating a record.
///
/// Unlike `/invoices/upload` this runs the extractor inline and the caller
/// waits for the provider; nothing is persisted either way.
pub async fn extract_invoice(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ExtractResponse>) {
    let started = Instant::now();

    let mut upload: Option<UploadedImage> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ExtractResponse::failure(format!(
                        "Invalid multipart request: {}",
                        e
                    ))),
                );
            }
        };

        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ExtractResponse::failure(format!(
                        "Failed to read image field: {}",
                        e
                    ))),
                );
            }
        };

        upload = Some(UploadedImage {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let Some(upload) = upload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ExtractResponse::failure("Image file is required")),
        );
    };

    match state.orchestrator().extract_preview(upload).await {
        Ok(data) => (
            StatusCode::OK,
            Json(ExtractResponse {
                success: true,
                data: Some(data),
                error: None,
                processing_time_ms: Some(started.elapsed().as_millis() as i64),
            }),
        ),
        Err(e) => (extract_status(&e), Json(ExtractResponse::failure(e.to_string()))),
    }
}

/// The provider error classes map to distinct gateway statuses here; the
/// record routes never surface them, so this mapping is local.
fn extract_status(e: &OrchestratorError) -> StatusCode {
    match e {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Extraction(ExtractionError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
        OrchestratorError::Extraction(ExtractionError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        OrchestratorError::Extraction(ExtractionError::Upstream { .. }) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
