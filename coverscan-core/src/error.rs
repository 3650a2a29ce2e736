use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoverscanError {
    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Fingerprint length mismatch: {left} bits vs {right} bits")]
    LengthMismatch { left: u32, right: u32 },

    #[error("Cannot compare empty fingerprints")]
    EmptyFingerprint,

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Catalog store I/O error at {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Frame source error: {0}")]
    FrameSource(String),

    #[error("A recognition session is already active (session {0})")]
    SessionActive(u64),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CoverscanError {
    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoverscanError>;
