//! Terrain generator abstraction.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// Parameters handed to a terrain generator.
///
/// Mirrors the input file of the classic stochastic surface generators:
/// an autocorrelation family, a (conventionally negative) seed, the two
/// correlation lengths in metres, and the raster shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainRequest {
    /// Autocorrelation method (1..=5)
    pub method: u8,

    /// Generator seed (expected negative, any value accepted)
    pub seed: i64,

    /// Correlation length along x (metres)
    pub x_corr_len: f64,

    /// Correlation length along y (metres)
    pub y_corr_len: f64,

    /// Number of rows (y samples)
    pub rows: usize,

    /// Number of columns (x samples)
    pub cols: usize,

    /// Grid spacing in metres, used to express correlation lengths in cells
    pub resolution: f64,
}

/// A dense, unscaled raster returned by a generator.
///
/// Values are row-major: `values[row * cols + col]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRaster {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl RawRaster {
    /// Creates a raster, checking that the value count matches the shape.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self, EnvError> {
        if values.len() != rows * cols {
            return Err(EnvError::shape(format!(
                "raster has {} values, expected {}x{}={}",
                values.len(),
                rows,
                cols,
                rows * cols
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Returns (min, max) over all values, ignoring NaN.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// The external stochastic terrain generator.
///
/// # Implementations
///
/// - **Reference**: `CorrelatedFieldGenerator` - moving-average filtered
///   white noise, deterministic per seed
/// - **External**: any binding to a spectral random-field program
///
/// The core consumes only the raw raster and rescales it itself, so
/// implementations do not need to honour any elevation range.
pub trait TerrainGenerator: Send + Sync {
    /// Produces a raw raster of exactly `request.rows x request.cols`.
    fn generate(&self, request: &TerrainRequest) -> Result<RawRaster, EnvError>;

    /// Human-readable generator name (for the audit record).
    fn name(&self) -> &str;
}
