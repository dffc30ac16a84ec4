use std::time::Duration;

use browserless_client::BrowserlessError;
use landscout_store::StoreError;

/// Result type alias for enrichment operations.
pub type Result<T> = std::result::Result<T, EnrichError>;

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("Transient network failure: {0}")]
    TransientNetwork(String),

    #[error("No session engine could start (tried: {})", .tried.join(", "))]
    SessionEngineUnavailable { tried: Vec<String> },

    #[error("Form interaction failed: {0}")]
    FormInteraction(String),

    #[error("Render timed out after {0:?}")]
    RenderTimeout(Duration),

    #[error("Artifact could not be parsed: {0}")]
    ArtifactParse(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EnrichError {
    /// Failures that may clear up on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, EnrichError::TransientNetwork(_))
    }

    /// Failures that must stop the run rather than just the current record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EnrichError::Store(e) if e.is_integrity_violation())
    }
}

impl From<reqwest::Error> for EnrichError {
    fn from(err: reqwest::Error) -> Self {
        EnrichError::TransientNetwork(err.to_string())
    }
}

impl From<BrowserlessError> for EnrichError {
    fn from(err: BrowserlessError) -> Self {
        match err {
            BrowserlessError::Timeout(secs) => EnrichError::RenderTimeout(Duration::from_secs(secs)),
            e if e.is_transient() => EnrichError::TransientNetwork(e.to_string()),
            e => EnrichError::Other(anyhow::anyhow!("browserless: {e}")),
        }
    }
}
