//! Error Handling Module
//!
//! Defines the error types that cross the classification core boundary.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only `Error::ImageDecode` is ever produced by a classification call:
//! artifact-load failures are recovered internally by falling back to the
//! heuristic path, and irrelevant images are a successful result, not an
//! error.

use thiserror::Error;

/// Main error type for plantcheck operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input image could not be decoded (malformed data or zero dimensions)
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// The caller cancelled the classification while it was in flight
    #[error("Classification cancelled")]
    Cancelled,

    /// Invalid configuration (registry data, rule tables)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageDecode(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type for plantcheck operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// User-facing message suitable for direct display by the UI layer
    pub fn user_message(&self) -> String {
        match self {
            Error::ImageDecode(_) => {
                "Could not read the image. Please check the file and try again.".to_string()
            }
            Error::Cancelled => "The analysis was cancelled.".to_string(),
            _ => "Plant analysis failed. Please try again.".to_string(),
        }
    }
}
