use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertwatchError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("Storage failed: {0}")]
    Storage(String),

    #[error("Storage I/O failed: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV processing failed: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Refresh cancelled after {completed} of {total} domains")]
    Cancelled { completed: usize, total: usize },

    #[error("{0}")]
    Other(String),
}

impl CertwatchError {
    /// True for the persistence failures that a mutating operation must report.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            CertwatchError::Storage(_) | CertwatchError::StorageIo(_) | CertwatchError::JsonError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CertwatchError>;
