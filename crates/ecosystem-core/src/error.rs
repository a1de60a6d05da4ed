use std::path::PathBuf;

use thiserror::Error;

/// Core error type for the research ecosystem.
#[derive(Debug, Error)]
pub enum EcosystemError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("http client error: {0}")]
    Http(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EcosystemError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Failure raised inside a stage agent. The stage boundary turns it into an
/// error-shaped `StageResult`; it never escapes the pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    /// The language backend call failed or timed out.
    #[error("language backend call failed: {0}")]
    Backend(String),
    #[error("{0}")]
    Internal(String),
}

impl StageError {
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("failed to serialise prompt data: {err}"))
    }
}
