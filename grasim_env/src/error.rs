//! Error types for the GraSim collaborator boundary.

use thiserror::Error;

/// Errors raised by external collaborators.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Raster file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raster content is malformed
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Autocorrelation method outside the generator's range
    #[error("Unsupported autocorrelation method: {0} (expected 1..=5)")]
    UnsupportedMethod(u8),

    /// Collaborator produced or was asked for an impossible shape
    #[error("Shape error: {0}")]
    Shape(String),

    /// Invalid numeric parameter (non-finite, non-positive, ...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl EnvError {
    /// Creates a parse error for a 1-based line number.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse { line, message: message.into() }
    }

    /// Creates a shape error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Creates an invalid parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
