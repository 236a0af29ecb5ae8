//! Gemini-backed invoice extraction client.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ExtractedData, ExtractionError, Extractor, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_TIMEOUT_SECS,
};

/// Gemini extraction backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Gemini API key (required).
    pub api_key: String,
    /// Model name (default: gemini-2.5-flash).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Base URL (default: https://generativelanguage.googleapis.com/v1beta).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-call deadline in seconds (default: 90).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Ceiling on accepted image size in bytes (default: 10 MiB).
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

/// Extraction client calling the Gemini generateContent API.
pub struct GeminiExtractor {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_image_bytes: usize,
}

impl GeminiExtractor {
    /// Create a new client. Fails if the API key is missing or the HTTP
    /// client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, ExtractionError> {
        if config.api_key.is_empty() {
            return Err(ExtractionError::InvalidInput(
                "Gemini API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string())
            .trim_end_matches('/')
            .to_string();

        let model = config
            .model
            .unwrap_or_else(|| "gemini-2.5-flash".to_string());

        Ok(Self {
            client,
            base_url,
            model,
            api_key: config.api_key,
            max_image_bytes: config.max_image_bytes,
        })
    }

    fn validate_input(&self, image_bytes: &[u8], mime_type: &str) -> Result<(), ExtractionError> {
        if image_bytes.is_empty() {
            return Err(ExtractionError::InvalidInput(
                "empty image data".to_string(),
            ));
        }
        if image_bytes.len() > self.max_image_bytes {
            return Err(ExtractionError::InvalidInput(format!(
                "image too large ({} bytes, max {})",
                image_bytes.len(),
                self.max_image_bytes
            )));
        }
        if !mime_type.starts_with("image/") {
            return Err(ExtractionError::InvalidInput(format!(
                "invalid image type: {}",
                mime_type
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedData, ExtractionError> {
        self.validate_input(image_bytes, mime_type)?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: Some(extraction_prompt().to_string()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: BASE64.encode(image_bytes),
                        }),
                    },
                ],
            }],
        };

        debug!(
            "Sending {} byte {} image to Gemini model {}",
            image_bytes.len(),
            mime_type,
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Upstream {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Parse(format!("unreadable response body: {}", e)))?;

        let text = body.text();
        if text.is_empty() {
            return Err(ExtractionError::Parse(
                "empty text in Gemini response".to_string(),
            ));
        }

        parse_extraction_response(&text)
    }
}

/// Parse the model's reply, tolerating markdown code fences around the JSON.
fn parse_extraction_response(text: &str) -> Result<ExtractedData, ExtractionError> {
    let text = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(text).map_err(|e| ExtractionError::Parse(e.to_string()))
}

fn extraction_prompt() -> &'static str {
    r#"Extract invoice data from this image and return ONLY valid JSON in the following format:

{
  "key_value_pairs": [
    {"key": "Invoice Number", "value": "...", "confidence": 0.95},
    {"key": "Date", "value": "...", "confidence": 0.90},
    {"key": "Vendor", "value": "...", "confidence": 0.85}
  ],
  "table": {
    "headers": ["Item", "Quantity", "Price", "Total"],
    "rows": [
      ["Item 1", "2", "100.00", "200.00"]
    ]
  },
  "summary": [
    {"key": "Subtotal", "value": "...", "confidence": 0.95},
    {"key": "Tax", "value": "...", "confidence": 0.90},
    {"key": "Total", "value": "...", "confidence": 0.95}
  ],
  "confidence": 0.90
}

Rules:
- Extract all visible invoice information, both printed and handwritten
- If a table exists, extract it with headers and rows; otherwise set "table" to null
- Include confidence scores (0.0 to 1.0) for each field
- Keep field names in the invoice's own language
- Extract dates, amounts, and numbers accurately
- Return ONLY the JSON object, no additional text or markdown"#
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
