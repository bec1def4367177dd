//! Error types for abovegrid.
//!
//! Only whole-input problems surface as errors: an unreadable file, a document
//! that is not JSON, a corrupt snapshot. Problems with a single cell or record
//! are reported through [`SkipList`](crate::compute::validation::SkipList) instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GridError>;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid snapshot format")]
    InvalidFormat,

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "geojson")]
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[cfg(feature = "snapshot")]
    #[error("Snapshot encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}
