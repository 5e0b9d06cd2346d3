//! File export port

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::capture::CapturedFile;

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name for {0}")]
    NameExhausted(String),
}

/// Port for handing a finished capture to the user
#[async_trait]
pub trait FileExporter: Send + Sync {
    /// Export the payload under the file's display name and return where it
    /// landed. Never overwrites an existing file.
    async fn export(&self, file: &CapturedFile) -> Result<PathBuf, ExportError>;
}
