//! Error types for the gallery rotator

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gallery rotator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the gallery rotator
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to decode image header of {path}: {message}")]
    ImageDecode { path: PathBuf, message: String },

    #[error("Library path does not exist: {}", .0.display())]
    LibraryNotFound(PathBuf),

    #[error("State file error: {0}")]
    StateFile(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Worker thread error: {0}")]
    Worker(String),
}
