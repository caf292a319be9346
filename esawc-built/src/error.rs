//! Error types for built-up area extraction.

use thiserror::Error;

/// Errors produced while querying Earth Engine for a region.
///
/// Only [`BuiltupError::DataUnavailable`] and [`BuiltupError::UnsupportedGeometry`]
/// are recovered per region by the batch driver; every other kind aborts a run.
#[derive(Error, Debug)]
pub enum BuiltupError {
    #[error("no built-up value available for region: {0}")]
    DataUnavailable(String),

    #[error("unsupported geometry type: {0} (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Earth Engine returned error {status}: {message}")]
    Service { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuiltupError {
    /// True when the remote service could not resolve a value for the region.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, BuiltupError::DataUnavailable(_))
    }
}

/// Result alias for built-up operations.
pub type Result<T> = std::result::Result<T, BuiltupError>;
