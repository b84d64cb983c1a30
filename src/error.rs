use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DupError {
    /// Malformed size string, configuration file or option combination.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// An input path or glob that resolves to nothing or cannot be accessed.
    #[error("cannot use input '{}': {reason}", path.display())]
    Path { path: PathBuf, reason: String },

    /// Failure while reading metadata or content of one file.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DupError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the run before any scanning happens.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

pub type Result<T> = std::result::Result<T, DupError>;
