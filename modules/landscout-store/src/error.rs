use std::path::PathBuf;

use landscout_common::StockNumberError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Batch is missing required columns: {}", .0.join(", "))]
    MissingRequiredColumns(Vec<String>),

    #[error("Duplicate stock number {0}; batch aborted before write")]
    DuplicateIdentifier(String),

    #[error("Duplicate identity key {0}; batch aborted before write")]
    DuplicateIdentityKey(String),

    #[error("Invalid stock number: {0}")]
    InvalidIdentifier(#[from] StockNumberError),

    #[error("No record with identity key {0}")]
    RecordNotFound(String),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Identity-integrity violations stop a batch and need an operator.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateIdentifier(_)
                | StoreError::DuplicateIdentityKey(_)
                | StoreError::InvalidIdentifier(_)
        )
    }
}
