use arrow::error::ArrowError;
use portico_types::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum DataPlaneError {
    /// Arrow IPC stream could not be written or read.
    #[error("columnar encoding failed: {0}")]
    Columnar(#[from] ArrowError),

    /// Even the string fallback could not be JSON-encoded.
    #[error("payload is not JSON-encodable: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataPlaneError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::DataPlane
    }
}

pub type Result<T> = std::result::Result<T, DataPlaneError>;
