//! Error types for weimark operations.

use thiserror::Error;

/// Errors that can occur while converting or exporting a document.
///
/// Stage-local recoverable failures (a formula that fails to render, a
/// diagram with bad syntax) never surface here; those degrade to inline
/// error fragments inside the output. This enum is reserved for genuinely
/// rejected operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid template data: {0}")]
    InvalidTemplate(String),

    #[error("Image rejected: {0}")]
    Image(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
