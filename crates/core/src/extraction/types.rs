//! Structured data extracted from an invoice image.

use serde::{Deserialize, Serialize};

/// A single extracted field with an optional confidence score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Line-item table detected on the invoice, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The full structured extraction result.
///
/// Field aliases accept the camelCase spelling some provider responses use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedData {
    #[serde(default, alias = "keyValuePairs")]
    pub key_value_pairs: Vec<KeyValuePair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableData>,
    #[serde(default)]
    pub summary: Vec<KeyValuePair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ExtractedData {
    /// True when the provider found nothing at all.
    pub fn is_empty(&self) -> bool {
        self.key_value_pairs.is_empty() && self.summary.is_empty() && self.table.is_none()
    }
}
