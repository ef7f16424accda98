//! Error types for log mining.

use std::io;
use std::path::PathBuf;

/// Failures while locating a compile command.
#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    #[error("build logs not available at {0}; build the file in Xcode first")]
    LogsUnavailable(PathBuf),

    #[error("no log directory known for this project")]
    NoLogDirectory,

    #[error("could not locate compile command for: {source_file}")]
    NotFound { source_file: String, filter: String },

    #[error("invalid match pattern: {0}")]
    Pattern(#[from] regex_lite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MinerError {
    /// Extra diagnostic text for the presentation layer.
    pub fn detail(&self) -> Option<String> {
        match self {
            MinerError::NotFound { filter, .. } => Some(filter.clone()),
            MinerError::LogsUnavailable(path) => Some(path.display().to_string()),
            _ => None,
        }
    }
}

/// Result type for log mining.
pub type MinerResult<T> = Result<T, MinerError>;
