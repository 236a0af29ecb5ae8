//! Testing utilities and mock implementations.
//!
//! Provides a scriptable extraction backend so the full upload lifecycle
//! can be exercised without a real provider.

mod mock_extractor;

pub use mock_extractor::{MockExtractor, MockOutcome};

/// Test fixtures and helper functions.
pub mod fixtures {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    use crate::extraction::{ExtractedData, KeyValuePair, TableData};

    /// A valid 1x1 PNG, small enough to inline in tests.
    pub fn tiny_png() -> Vec<u8> {
        BASE64
            .decode(
                "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJ\
                 AAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==",
            )
            .expect("fixture PNG is valid base64")
    }

    /// Bytes carrying a JPEG magic header, enough for MIME sniffing.
    pub fn jpeg_header() -> Vec<u8> {
        let mut bytes = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00,
        ];
        bytes.extend(std::iter::repeat(0u8).take(64));
        bytes
    }

    /// A plausible extraction result for a small invoice.
    pub fn sample_extracted_data() -> ExtractedData {
        ExtractedData {
            key_value_pairs: vec![
                KeyValuePair {
                    key: "Invoice Number".to_string(),
                    value: "INV-2024-001".to_string(),
                    confidence: Some(0.97),
                },
                KeyValuePair {
                    key: "Vendor".to_string(),
                    value: "ACME Supplies".to_string(),
                    confidence: Some(0.91),
                },
            ],
            table: Some(TableData {
                headers: vec![
                    "Item".to_string(),
                    "Quantity".to_string(),
                    "Total".to_string(),
                ],
                rows: vec![vec![
                    "Widget".to_string(),
                    "2".to_string(),
                    "20.00".to_string(),
                ]],
            }),
            summary: vec![KeyValuePair {
                key: "Total".to_string(),
                value: "20.00".to_string(),
                confidence: Some(0.95),
            }],
            confidence: Some(0.93),
        }
    }
}
