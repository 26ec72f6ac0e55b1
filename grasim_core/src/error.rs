//! Pipeline error taxonomy.
//!
//! Every failure is deterministic, so nothing here is retried: a stage
//! either completes or reports what was wrong and where.

use grasim_env::EnvError;
use thiserror::Error;

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raster resampling stride is not a positive integer
    #[error("[{stage}] resolution {resolution} is not a positive integer multiple of raster resolution {raster_resolution}")]
    InvalidResolutionRatio {
        stage: &'static str,
        resolution: f64,
        raster_resolution: f64,
    },

    /// Terrain synthesis failed or produced a mismatched shape
    #[error("[{stage}] terrain generator unavailable: {reason}")]
    GeneratorUnavailable { stage: &'static str, reason: String },

    /// Survey pick does not coincide with a grid node
    #[error("[{stage}] survey point ({x}, {y}) is not on the grid")]
    PointNotOnGrid { stage: &'static str, x: f64, y: f64 },

    /// Too few survey points to interpolate
    #[error("[{stage}] {found} survey points available, at least {required} required")]
    InsufficientPoints {
        stage: &'static str,
        found: usize,
        required: usize,
    },

    /// A stage ran before its upstream output existed
    #[error("[{stage}] missing prerequisite: {missing}")]
    MissingPrerequisite { stage: &'static str, missing: String },

    /// Two fields expected to align do not
    #[error("[{stage}] shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        stage: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// A numeric parameter is out of range
    #[error("[{stage}] invalid parameter: {message}")]
    InvalidParameter { stage: &'static str, message: String },

    /// Survey points cannot be triangulated (all collinear)
    #[error("[{stage}] degenerate survey geometry: {message}")]
    DegenerateGeometry { stage: &'static str, message: String },
}

impl PipelineError {
    /// Creates a missing-prerequisite error.
    pub fn missing(stage: &'static str, missing: impl std::fmt::Display) -> Self {
        Self::MissingPrerequisite {
            stage,
            missing: missing.to_string(),
        }
    }

    /// Creates a shape-mismatch error.
    pub fn shape(stage: &'static str, expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::ShapeMismatch { stage, expected, found }
    }

    /// Creates an invalid-parameter error.
    pub fn invalid(stage: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            stage,
            message: message.into(),
        }
    }

    /// Wraps a collaborator failure. Rejected parameters stay
    /// `InvalidParameter`; anything else is `GeneratorUnavailable`.
    pub fn generator(stage: &'static str, err: EnvError) -> Self {
        match err {
            EnvError::InvalidParameter(message) => Self::InvalidParameter { stage, message },
            other => Self::GeneratorUnavailable {
                stage,
                reason: other.to_string(),
            },
        }
    }

    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidResolutionRatio { stage, .. }
            | Self::GeneratorUnavailable { stage, .. }
            | Self::PointNotOnGrid { stage, .. }
            | Self::InsufficientPoints { stage, .. }
            | Self::MissingPrerequisite { stage, .. }
            | Self::ShapeMismatch { stage, .. }
            | Self::InvalidParameter { stage, .. }
            | Self::DegenerateGeometry { stage, .. } => stage,
        }
    }
}

/// Convenience alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
