//! Invoice lifecycle orchestration.
//!
//! Owns the `pending -> processing -> {completed, failed}` state machine:
//! the synchronous upload path (validate, store blob, create record) and the
//! detached background task that drives a record to its terminal state. All
//! communication between the two happens through the invoice store.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, warn};

use crate::extraction::{ExtractedData, ExtractionError, Extractor};
use crate::invoice::{
    new_invoice_id, Invoice, InvoiceStatus, InvoiceStore, PageRequest, StoreError,
};
use crate::storage::{FileStorage, StorageError};

/// Ceiling on accepted upload size (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Bad upload: missing, empty, oversized, or not an image.
    #[error("{0}")]
    Validation(String),

    /// Record store failure (includes unknown-id lookups).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Blob store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Extraction failure on the synchronous preview path. The background
    /// task never produces this; its extraction errors land in the failed
    /// record instead.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// An image file received from a client.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Original filename; only its extension is kept.
    pub filename: String,
    /// Content type as declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A record resolved for callers: locator replaced by a reachable URL,
/// extraction result surfaced only for completed records.
#[derive(Debug, Clone)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub image_url: String,
    pub extracted_data: Option<serde_json::Value>,
}

/// One page of resolved records.
#[derive(Debug, Clone)]
pub struct InvoiceDetailsPage {
    pub invoices: Vec<InvoiceDetails>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

/// The invoice lifecycle orchestrator.
///
/// Holds no per-record state of its own; the store owns all durable state
/// and every background task re-fetches before it writes.
pub struct InvoiceOrchestrator {
    store: Arc<dyn InvoiceStore>,
    storage: Arc<dyn FileStorage>,
    extractor: Arc<dyn Extractor>,
}

impl InvoiceOrchestrator {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        storage: Arc<dyn FileStorage>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            store,
            storage,
            extractor,
        }
    }

    /// Accept an upload: validate, persist the blob, create the pending
    /// record, and launch the background extraction task. Returns as soon as
    /// the record exists; extraction progress is observed by polling.
    pub async fn upload(&self, upload: UploadedImage) -> Result<InvoiceDetails, OrchestratorError> {
        let mime_type = validate_image(&upload)?;

        let id = new_invoice_id();
        let blob_name = match Path::new(&upload.filename)
            .extension()
            .and_then(|e| e.to_str())
        {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.clone(),
        };

        let locator = self
            .storage
            .save(&blob_name, &upload.bytes, &mime_type)
            .await?;

        let invoice = Invoice::new(id.clone(), locator);
        self.store.create(&invoice)?;

        self.spawn_extraction(id, upload.bytes, mime_type);

        Ok(self.resolve(invoice))
    }

    /// Launch the detached extraction task for a freshly created record.
    ///
    /// The task runs independently of the originating request: a client
    /// disconnect does not cancel it, and its result is only ever reported
    /// through the store.
    fn spawn_extraction(&self, id: String, image_bytes: Vec<u8>, mime_type: String) {
        let store = Arc::clone(&self.store);
        let extractor = Arc::clone(&self.extractor);

        tokio::spawn(async move {
            run_extraction(store, extractor, id, image_bytes, mime_type).await;
        });
    }

    /// One-shot extraction with no side effects: validate the image exactly
    /// like `upload`, run the extractor inline, and return the structured
    /// result. Nothing is stored; the caller waits for the provider.
    pub async fn extract_preview(
        &self,
        upload: UploadedImage,
    ) -> Result<ExtractedData, OrchestratorError> {
        let mime_type = validate_image(&upload)?;
        Ok(self.extractor.extract(&upload.bytes, &mime_type).await?)
    }

    /// Fetch one record, resolved for callers.
    pub fn get(&self, id: &str) -> Result<InvoiceDetails, OrchestratorError> {
        let invoice = self.store.get(id)?;
        Ok(self.resolve(invoice))
    }

    /// List records, most recent first, resolved for callers.
    pub fn list(&self, page: PageRequest) -> Result<InvoiceDetailsPage, OrchestratorError> {
        let result = self.store.list(page)?;
        Ok(InvoiceDetailsPage {
            invoices: result
                .invoices
                .into_iter()
                .map(|inv| self.resolve(inv))
                .collect(),
            total: result.total,
            page: result.page,
            page_size: result.page_size,
            total_pages: result.total_pages,
        })
    }

    /// Delete a record and, best-effort, its blob. Does not cancel an
    /// in-flight extraction task; a late update on the deleted record fails
    /// at the store and is logged there.
    pub async fn delete(&self, id: &str) -> Result<(), OrchestratorError> {
        let invoice = self.store.get(id)?;

        if !invoice.image_path.is_empty() {
            if let Err(e) = self.storage.delete(&invoice.image_path).await {
                warn!("Failed to delete image blob {}: {}", invoice.image_path, e);
            }
        }

        self.store.delete(id)?;
        Ok(())
    }

    /// Manual metadata edit: overwrite `extracted_data` directly. This is
    /// not a state transition and deliberately bypasses the state machine;
    /// it may race with an in-flight background task (last writer wins).
    pub fn overwrite_extracted_data(
        &self,
        id: &str,
        data: serde_json::Value,
    ) -> Result<InvoiceDetails, OrchestratorError> {
        let mut invoice = self.store.get(id)?;

        self.store.update(&mut invoice, &|inv| {
            inv.extracted_data = Some(data.clone());
            inv.updated_at = chrono::Utc::now();
            Ok(())
        })?;

        Ok(self.resolve(invoice))
    }

    /// Map a stored record to its caller-facing form. Extraction data is
    /// surfaced only for completed records; an unreadable payload is shown
    /// as absent rather than failing the read.
    fn resolve(&self, invoice: Invoice) -> InvoiceDetails {
        let image_url = self.storage.url_for(&invoice.image_path);
        let extracted_data = match invoice.status {
            InvoiceStatus::Completed => invoice.extracted_data.clone(),
            InvoiceStatus::Pending | InvoiceStatus::Processing | InvoiceStatus::Failed => None,
        };

        InvoiceDetails {
            invoice,
            image_url,
            extracted_data,
        }
    }
}

/// The background extraction pipeline for one record.
///
/// Performs its store updates strictly in sequence and reaches exactly one
/// terminal state per successful run. Any persistence failure along the way
/// is logged and the pipeline abandoned; there is no retry.
async fn run_extraction(
    store: Arc<dyn InvoiceStore>,
    extractor: Arc<dyn Extractor>,
    id: String,
    image_bytes: Vec<u8>,
    mime_type: String,
) {
    // Re-fetch instead of trusting the reference captured at launch time.
    let mut invoice = match store.get(&id) {
        Ok(invoice) => invoice,
        Err(e) => {
            error!("Failed to fetch invoice {} for extraction: {}", id, e);
            return;
        }
    };

    if let Err(e) = store.update(&mut invoice, &|inv| {
        inv.mark_processing();
        Ok(())
    }) {
        error!("Failed to move invoice {} to processing: {}", id, e);
        return;
    }

    let data = match extractor.extract(&image_bytes, &mime_type).await {
        Ok(data) => data,
        Err(e) => {
            let message = e.to_string();
            if let Err(update_err) = store.update(&mut invoice, &|inv| {
                inv.mark_failed(message.clone());
                Ok(())
            }) {
                error!("Failed to move invoice {} to failed: {}", id, update_err);
            }
            return;
        }
    };

    let value = match serde_json::to_value(&data) {
        Ok(value) => value,
        Err(e) => {
            let message = format!("Failed to serialize extracted data: {}", e);
            if let Err(update_err) = store.update(&mut invoice, &|inv| {
                inv.mark_failed(message.clone());
                Ok(())
            }) {
                error!("Failed to move invoice {} to failed: {}", id, update_err);
            }
            return;
        }
    };

    if let Err(e) = store.update(&mut invoice, &|inv| {
        inv.mark_completed(value.clone());
        Ok(())
    }) {
        error!("Failed to move invoice {} to completed: {}", id, e);
    }
}

/// Validate an uploaded image and settle on its MIME type: non-empty, within
/// the size ceiling, and declared or sniffed as `image/*`.
fn validate_image(upload: &UploadedImage) -> Result<String, OrchestratorError> {
    if upload.bytes.is_empty() {
        return Err(OrchestratorError::Validation(
            "Image file is empty".to_string(),
        ));
    }

    if upload.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(OrchestratorError::Validation(
            "Image file too large (max 10MB)".to_string(),
        ));
    }

    let mime_type = match upload.content_type.as_deref().filter(|ct| !ct.is_empty()) {
        Some(declared) => declared.to_string(),
        None => sniff_image_mime(&upload.bytes).ok_or_else(|| {
            OrchestratorError::Validation("Could not determine image type".to_string())
        })?,
    };

    if !mime_type.starts_with("image/") {
        return Err(OrchestratorError::Validation(
            "Invalid file type. Only images are allowed".to_string(),
        ));
    }

    Ok(mime_type)
}

/// Sniff an image MIME type from the payload's magic bytes.
fn sniff_image_mime(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}
