//! Common test utilities for E2E testing with mocks.
//!
//! Provides a test fixture that builds the full router in-process with a
//! mock extractor injected, so the complete upload-to-terminal-state flow
//! can be exercised without network access or a real Gemini key.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use invox_core::{
    Config, DatabaseConfig, ExtractionBackend, ExtractionConfig, FileStorage, InvoiceOrchestrator,
    InvoiceStore, LocalStorage, ServerConfig, SqliteInvoiceStore, StorageConfig,
    testing::MockExtractor,
};

/// Re-export fixtures for test convenience
pub use invox_core::testing::fixtures;

/// Test fixture wrapping an in-process server with a mock extractor.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock extractor, controls extraction outcomes
    pub extractor: Arc<MockExtractor>,
    /// Temporary directory for the test database and uploads
    pub temp_dir: TempDir,
    /// Directory uploaded blobs land in
    pub upload_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let upload_dir = temp_dir.path().join("uploads");

        let config = Config {
            extraction: ExtractionConfig {
                backend: ExtractionBackend::Gemini,
                gemini: None,
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            storage: StorageConfig {
                upload_dir: upload_dir.clone(),
                base_url: "http://localhost:3001".to_string(),
            },
            cors: None,
        };

        let store: Arc<dyn InvoiceStore> = Arc::new(
            SqliteInvoiceStore::new(&db_path).expect("Failed to create invoice store"),
        );
        let storage: Arc<dyn FileStorage> = Arc::new(
            LocalStorage::new(upload_dir.clone(), &config.storage.base_url)
                .expect("Failed to create file storage"),
        );
        let extractor = Arc::new(MockExtractor::new());

        let orchestrator = InvoiceOrchestrator::new(
            store,
            storage,
            Arc::clone(&extractor) as Arc<dyn invox_core::Extractor>,
        );

        let state = Arc::new(invox_server::state::AppState::new(config, orchestrator));
        let router = invox_server::api::create_router(state);

        Self {
            router,
            extractor,
            temp_dir,
            upload_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Upload a file through the multipart endpoint.
    pub async fn upload(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> TestResponse {
        self.upload_field("image", filename, content_type, bytes)
            .await
    }

    /// Upload a file under an arbitrary multipart field name.
    pub async fn upload_field(
        &self,
        field: &str,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> TestResponse {
        self.multipart_post("/invoices/upload", field, filename, content_type, bytes)
            .await
    }

    /// Post a single-file multipart body to any path.
    pub async fn multipart_post(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> TestResponse {
        const BOUNDARY: &str = "test-fixture-boundary";

        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        if let Some(ct) = content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    /// Poll an invoice until it reaches a terminal status.
    pub async fn wait_for_terminal(&self, id: &str) -> TestResponse {
        for _ in 0..100 {
            let response = self.get(&format!("/invoices/{}", id)).await;
            match response.body["status"].as_str() {
                Some("completed") | Some("failed") => return response,
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        panic!("Invoice {} never reached a terminal status", id);
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
