// Upload failure taxonomy and its mapping onto HTTP status codes
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request head incomplete")]
    IncompleteHeaders,

    #[error("invalid security code")]
    AuthFailed,

    #[error("no file name provided")]
    MissingFileName,

    #[error("unsafe file name: {0:?}")]
    UnsafeFileName(String),

    #[error("invalid content length: {0}")]
    InvalidContentLength(i64),

    #[error("body of {declared} bytes exceeds limit of {limit}")]
    BodyTooLarge { declared: usize, limit: usize },

    #[error("cannot allocate {0} bytes for body")]
    AllocationFailure(usize),

    /// Only raised when truncated bodies are configured as a hard failure.
    #[error("body truncated: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: usize, received: usize },

    #[error("cannot open {} for writing: {source}", path.display())]
    FileOpen { path: PathBuf, source: std::io::Error },

    #[error("cannot write {}: {source}", path.display())]
    FileWrite { path: PathBuf, source: std::io::Error },
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::IncompleteHeaders
            | UploadError::MissingFileName
            | UploadError::UnsafeFileName(_)
            | UploadError::TruncatedBody { .. } => StatusCode::BAD_REQUEST,
            UploadError::AuthFailed => StatusCode::FORBIDDEN,
            UploadError::InvalidContentLength(_) => StatusCode::LENGTH_REQUIRED,
            UploadError::BodyTooLarge { .. }
            | UploadError::AllocationFailure(_)
            | UploadError::FileOpen { .. }
            | UploadError::FileWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
