use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::extraction::GeminiConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    3001
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("invox.db")
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory uploaded images are written into.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Public base URL images are served from.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            base_url: default_base_url(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

/// Extraction configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Extraction backend type
    pub backend: ExtractionBackend,
    /// Gemini-specific configuration (required when backend = "gemini")
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
}

/// Available extraction backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionBackend {
    Gemini,
    // Future: other document-understanding providers
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Origin allowed to call the API (e.g. "http://localhost:5173").
    pub allowed_origin: String,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub extraction: SanitizedExtractionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsConfig>,
}

/// Sanitized extraction config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedExtractionConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<SanitizedGeminiConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGeminiConfig {
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub max_image_bytes: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            storage: config.storage.clone(),
            extraction: SanitizedExtractionConfig {
                backend: match config.extraction.backend {
                    ExtractionBackend::Gemini => "gemini".to_string(),
                },
                gemini: config.extraction.gemini.as_ref().map(|g| {
                    SanitizedGeminiConfig {
                        api_key_configured: !g.api_key.is_empty(),
                        model: g.model.clone(),
                        timeout_secs: g.timeout_secs,
                        max_image_bytes: g.max_image_bytes,
                    }
                }),
            },
            cors: config.cors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[extraction]
backend = "gemini"

[extraction.gemini]
api_key = "test-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.extraction.backend, ExtractionBackend::Gemini);
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "invox.db");
        assert_eq!(config.storage.upload_dir.to_str().unwrap(), "uploads");

        let gemini = config.extraction.gemini.as_ref().unwrap();
        assert_eq!(gemini.api_key, "test-key");
        assert_eq!(gemini.timeout_secs, 90); // default
        assert_eq!(gemini.max_image_bytes, 10 * 1024 * 1024); // default
    }

    #[test]
    fn test_deserialize_missing_extraction_fails() {
        let toml = r#"
[server]
port = 3001
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_custom_sections() {
        let toml = r#"
[extraction]
backend = "gemini"

[extraction.gemini]
api_key = "k"
model = "gemini-2.5-pro"
timeout_secs = 30

[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/invoices.db"

[storage]
upload_dir = "/data/uploads"
base_url = "https://invoices.example.com"

[cors]
allowed_origin = "http://localhost:5173"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path.to_str().unwrap(), "/data/invoices.db");
        assert_eq!(config.storage.base_url, "https://invoices.example.com");
        assert_eq!(
            config.cors.as_ref().unwrap().allowed_origin,
            "http://localhost:5173"
        );
        let gemini = config.extraction.gemini.as_ref().unwrap();
        assert_eq!(gemini.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(gemini.timeout_secs, 30);
    }

    #[test]
    fn test_sanitized_config_redacts_api_key() {
        let toml = r#"
[extraction]
backend = "gemini"

[extraction.gemini]
api_key = "super-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert_eq!(sanitized.extraction.backend, "gemini");
        let gemini = sanitized.extraction.gemini.as_ref().unwrap();
        assert!(gemini.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
