use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that end a generation run
#[derive(Debug, Error)]
pub enum FluxError {
    /// Missing API key or an unusable settings file
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The initial POST was rejected or answered with something unreadable
    #[error("Submission failed: {message}")]
    Submission { message: String },

    /// The service reported a failed job, or the result could not be collected
    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FluxError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
