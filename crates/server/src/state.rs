use invox_core::{Config, InvoiceOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: InvoiceOrchestrator,
}

impl AppState {
    pub fn new(config: Config, orchestrator: InvoiceOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &InvoiceOrchestrator {
        &self.orchestrator
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }
}
