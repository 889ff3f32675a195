//! Error type shared by loading, parsing and persistence

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpgError {
    #[error("request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not saving {}: it could not be read at startup", .path.display())]
    Detached { path: PathBuf },

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EpgError>;
