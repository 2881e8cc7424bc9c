//! Error type for the fallible parts of capture and export.
//!
//! Unsupported input during capture (unknown topology, missing buffers,
//! unnamed attributes) is not an error; those paths log and skip.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RipperError {
    /// PNG encoding or decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Base64 payload could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// A texture URL that is not a `data:` URI with a base64 payload
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The asset sink rejected a write
    #[error("Sink error: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, RipperError>;
