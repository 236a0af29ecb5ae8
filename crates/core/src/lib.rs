pub mod config;
pub mod extraction;
pub mod invoice;
pub mod orchestrator;
pub mod storage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, CorsConfig,
    DatabaseConfig, ExtractionBackend, ExtractionConfig, SanitizedConfig, ServerConfig,
    StorageConfig,
};
pub use extraction::{
    ExtractedData, ExtractionError, Extractor, GeminiConfig, GeminiExtractor, KeyValuePair,
    TableData,
};
pub use invoice::{
    new_invoice_id, Invoice, InvoicePage, InvoiceStatus, InvoiceStore, InvoiceTxn,
    PageRequest, SqliteInvoiceStore, StoreError,
};
pub use orchestrator::{
    InvoiceDetails, InvoiceDetailsPage, InvoiceOrchestrator, OrchestratorError, UploadedImage,
    MAX_UPLOAD_BYTES,
};
pub use storage::{FileStorage, LocalStorage, StorageError};
