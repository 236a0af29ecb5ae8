use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use invox_core::{
    InvoiceDetails, InvoiceStatus, OrchestratorError, PageRequest, StoreError, UploadedImage,
};

use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Caller-facing invoice record. `image_path` carries the resolved URL,
/// `extracted_data` appears only for completed records and `error_message`
/// only for failed ones.
#[derive(Serialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub status: InvoiceStatus,
    pub image_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<InvoiceDetails> for InvoiceResponse {
    fn from(details: InvoiceDetails) -> Self {
        let error_message = match details.invoice.status {
            InvoiceStatus::Failed => details.invoice.error_message.clone(),
            _ => None,
        };

        Self {
            id: details.invoice.id,
            status: details.invoice.status,
            image_path: details.image_url,
            extracted_data: details.extracted_data,
            error_message,
            created_at: details.invoice.created_at.to_rfc3339(),
            updated_at: details.invoice.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct ListInvoicesParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Serialize)]
pub struct ListInvoicesResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

#[derive(Deserialize)]
pub struct UpdateInvoiceBody {
    pub extracted_data: serde_json::Value,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn map_error(e: OrchestratorError) -> ApiError {
    let status = match &e {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub async fn upload_invoice(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let mut upload: Option<UploadedImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart request: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read image field: {}", e)))?;

        upload = Some(UploadedImage {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| bad_request("Image file is required"))?;

    let details = state
        .orchestrator()
        .upload(upload)
        .await
        .map_err(map_error)?;

    Ok(Json(details.into()))
}

pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListInvoicesParams>,
) -> Result<Json<ListInvoicesResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let result = state
        .orchestrator()
        .list(PageRequest { page, page_size })
        .map_err(map_error)?;

    Ok(Json(ListInvoicesResponse {
        invoices: result.invoices.into_iter().map(Into::into).collect(),
        total: result.total,
        page: result.page,
        page_size: result.page_size,
        total_pages: result.total_pages,
    }))
}

pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let details = state.orchestrator().get(&id).map_err(map_error)?;
    Ok(Json(details.into()))
}

pub async fn delete_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator().delete(&id).await.map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateInvoiceBody>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let details = state
        .orchestrator()
        .overwrite_extracted_data(&id, body.extracted_data)
        .map_err(map_error)?;

    Ok(Json(details.into()))
}
