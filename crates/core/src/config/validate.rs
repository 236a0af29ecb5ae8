use super::{types::Config, ConfigError, ExtractionBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Storage paths are non-empty
/// - The selected extraction backend is fully configured
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Storage validation
    if config.storage.upload_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.upload_dir cannot be empty".to_string(),
        ));
    }
    if config.storage.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.base_url cannot be empty".to_string(),
        ));
    }

    // Extraction validation
    match config.extraction.backend {
        ExtractionBackend::Gemini => {
            let gemini = config.extraction.gemini.as_ref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "extraction.gemini is required when backend = \"gemini\"".to_string(),
                )
            })?;

            if gemini.api_key.is_empty() {
                return Err(ConfigError::ValidationError(
                    "extraction.gemini.api_key cannot be empty".to_string(),
                ));
            }
            if gemini.timeout_secs == 0 {
                return Err(ConfigError::ValidationError(
                    "extraction.gemini.timeout_secs cannot be 0".to_string(),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn valid_toml() -> &'static str {
        r#"
[extraction]
backend = "gemini"

[extraction.gemini]
api_key = "k"
"#
    }

    #[test]
    fn test_validate_valid_config() {
        let config = load_config_from_str(valid_toml()).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = load_config_from_str(valid_toml()).unwrap();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_missing_gemini_section_fails() {
        let mut config = load_config_from_str(valid_toml()).unwrap();
        config.extraction.gemini = None;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_api_key_fails() {
        let mut config = load_config_from_str(valid_toml()).unwrap();
        config.extraction.gemini.as_mut().unwrap().api_key = String::new();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_upload_dir_fails() {
        let mut config = load_config_from_str(valid_toml()).unwrap();
        config.storage.upload_dir = std::path::PathBuf::new();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
