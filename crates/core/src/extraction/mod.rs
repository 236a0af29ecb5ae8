//! Extraction of structured invoice data from images.

mod gemini;
mod types;

pub use gemini::{GeminiConfig, GeminiExtractor};
pub use types::{ExtractedData, KeyValuePair, TableData};

use async_trait::async_trait;
use thiserror::Error;

/// Default ceiling on image payload size (10 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Default deadline for one extraction call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Errors an extraction attempt can produce.
///
/// The orchestrator only distinguishes the classes, never provider details:
/// invalid input is caller error, timeout and upstream failures land in the
/// failed record's message.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Empty, oversized, or non-image input; detected before any network work.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider did not answer within the configured deadline.
    #[error("Extraction timed out")]
    Timeout,

    /// The provider answered with a failure.
    #[error("Extraction service error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// The provider answered, but not with usable structured data.
    #[error("Failed to parse extraction response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ExtractionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExtractionError::Timeout
        } else {
            ExtractionError::Upstream {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

/// Trait for extraction backends.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Turn image bytes into structured invoice data.
    async fn extract(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedData, ExtractionError>;
}
