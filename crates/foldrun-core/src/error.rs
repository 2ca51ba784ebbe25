use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FoldError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download of {asset} failed: HTTP {status}")]
    Download { asset: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid inference config: {0}")]
    InvalidConfig(String),

    #[error("Score archive error: {0}")]
    ScoreArchive(String),

    #[error("Remote inference failed: {0}")]
    Inference(String),

    #[error("Remote inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("Structure conversion failed: {0}")]
    Conversion(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<zip::result::ZipError> for FoldError {
    fn from(err: zip::result::ZipError) -> Self {
        FoldError::ScoreArchive(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FoldError>;
