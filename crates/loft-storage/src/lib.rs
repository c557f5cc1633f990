//! Storage volumes and placement
//!
//! A volume is an independently mounted directory the system can write files
//! into. Volumes are declared once at startup; placement picks the
//! least-utilized volume by walking each volume's file tree on demand.

mod selector;
mod url;
mod volume;

pub use selector::VolumeSelector;
pub use url::UrlPolicy;
pub use volume::{Volume, VolumeSet};

use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Volume traversal failed: {0}")]
    TraversalFailed(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
