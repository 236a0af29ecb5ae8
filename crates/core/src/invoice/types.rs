//! Core invoice record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generate a new invoice id.
///
/// UUIDv7 ids are time-ordered and lexicographically sortable in their
/// canonical form, and safe to generate from any number of concurrent
/// callers without coordination. The id doubles as the stored image's
/// filename stem, so collisions must be negligible even at high upload
/// rates.
pub fn new_invoice_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Lifecycle state of an invoice record.
///
/// Transitions are one-directional: `Pending -> Processing`, then
/// `Processing` moves to exactly one of the terminal states. Nothing ever
/// transitions back to `Pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Record created, extraction not started yet.
    Pending,
    /// Background extraction is running.
    Processing,
    /// Extraction finished, structured data attached.
    Completed,
    /// Extraction failed, error message attached.
    Failed,
}

impl InvoiceStatus {
    /// Stable string form, used for persistence and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::Completed => "completed",
            InvoiceStatus::Failed => "failed",
        }
    }

    /// Parse a persisted status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "processing" => Some(InvoiceStatus::Processing),
            "completed" => Some(InvoiceStatus::Completed),
            "failed" => Some(InvoiceStatus::Failed),
            _ => None,
        }
    }

    /// Whether no further automatic transition occurs from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Completed | InvoiceStatus::Failed)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted invoice record.
///
/// `id` and `image_path` are assigned at creation and immutable afterwards.
/// `extracted_data` is present exactly when the record completed;
/// `error_message` exactly when it failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub status: InvoiceStatus,
    /// Opaque blob locator for the uploaded image.
    pub image_path: String,
    /// Structured extraction result, set on completion.
    pub extracted_data: Option<serde_json::Value>,
    /// Failure detail, set when extraction failed.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a fresh pending record for an uploaded image.
    pub fn new(id: impl Into<String>, image_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: InvoiceStatus::Pending,
            image_path: image_path.into(),
            extracted_data: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to `Processing`.
    pub fn mark_processing(&mut self) {
        self.status = InvoiceStatus::Processing;
        self.updated_at = Utc::now();
    }

    /// Transition to `Completed` with the extraction result attached.
    pub fn mark_completed(&mut self, data: serde_json::Value) {
        self.status = InvoiceStatus::Completed;
        self.extracted_data = Some(data);
        self.updated_at = Utc::now();
    }

    /// Transition to `Failed` with a human-readable reason.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = InvoiceStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

/// Pagination parameters for list queries. Both fields are 1-indexed and
/// positive; callers clamp `page_size` to their own upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Row offset for this page.
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }
}

/// One page of invoice records plus listing metadata.
#[derive(Debug, Clone)]
pub struct InvoicePage {
    pub invoices: Vec<Invoice>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl InvoicePage {
    /// `ceil(total / page_size)`.
    pub fn total_pages_for(total: i64, page_size: u32) -> i64 {
        let size = page_size.max(1) as i64;
        (total + size - 1) / size
    }
}
