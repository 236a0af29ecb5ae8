//! Mock extraction backend for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::extraction::{ExtractedData, ExtractionError, Extractor};

/// What the mock should do on the next `extract` call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return the given payload.
    Success(ExtractedData),
    /// Fail with a timeout.
    Timeout,
    /// Fail with an upstream provider error.
    Upstream(String),
    /// Fail parsing the provider response.
    Parse(String),
}

/// Scriptable [`Extractor`] implementation.
///
/// Defaults to succeeding with the sample fixture payload. An optional delay
/// widens the window in which callers can observe the `processing` state.
pub struct MockExtractor {
    outcome: Mutex<MockOutcome>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(MockOutcome::Success(
                crate::testing::fixtures::sample_extracted_data(),
            )),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the next outcome.
    pub fn set_outcome(&self, outcome: MockOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    /// Succeed with the given payload.
    pub fn set_success(&self, data: ExtractedData) {
        self.set_outcome(MockOutcome::Success(data));
    }

    /// Fail with a timeout.
    pub fn set_timeout(&self) {
        self.set_outcome(MockOutcome::Timeout);
    }

    /// Fail with an upstream provider error.
    pub fn set_upstream_error(&self, message: impl Into<String>) {
        self.set_outcome(MockOutcome::Upstream(message.into()));
    }

    /// Sleep this long inside `extract` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of `extract` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedData, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        // Same pre-flight checks a real backend performs.
        if image_bytes.is_empty() {
            return Err(ExtractionError::InvalidInput(
                "empty image data".to_string(),
            ));
        }
        if !mime_type.starts_with("image/") {
            return Err(ExtractionError::InvalidInput(format!(
                "invalid image type: {}",
                mime_type
            )));
        }

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            MockOutcome::Success(data) => Ok(data),
            MockOutcome::Timeout => Err(ExtractionError::Timeout),
            MockOutcome::Upstream(message) => Err(ExtractionError::Upstream {
                status: Some(503),
                message,
            }),
            MockOutcome::Parse(message) => Err(ExtractionError::Parse(message)),
        }
    }
}
