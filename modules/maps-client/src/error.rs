use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapsError>;

#[derive(Debug, Error)]
pub enum MapsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Google Maps API key is not set")]
    MissingApiKey,
}

impl MapsError {
    /// Transport and decode failures, plus server-side HTTP errors, may
    /// succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            MapsError::Network(_) | MapsError::Parse(_) => true,
            MapsError::Api { status, .. } => *status == 429 || *status >= 500,
            MapsError::MissingApiKey => false,
        }
    }
}

impl From<reqwest::Error> for MapsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MapsError::Parse(err.to_string())
        } else {
            MapsError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MapsError {
    fn from(err: serde_json::Error) -> Self {
        MapsError::Parse(err.to_string())
    }
}
