//! Harness error type.

use grasim_core::PipelineError;
use grasim_env::EnvError;
use thiserror::Error;

/// Errors surfaced by the harness and the CLI.
#[derive(Debug, Error)]
pub enum SimError {
    /// A pipeline stage failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// A collaborator failed outside a pipeline stage (raster loading)
    #[error("Collaborator error: {0}")]
    Env(#[from] EnvError),

    /// Config or export file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config or export (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SimError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
