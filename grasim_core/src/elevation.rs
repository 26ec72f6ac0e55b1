//! True terrain and the measured DEM.
//!
//! The core never synthesises terrain itself: it asks a
//! [`TerrainGenerator`] for a raw raster and rescales it. The DEM is always
//! derived from the true surface plus a smoothed, bounded error field.

use crate::error::{PipelineError, Result};
use crate::field::GridField;
use crate::grid::Grid;
use grasim_env::{TerrainGenerator, TerrainRequest};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Method code for an imported raster (no synthesis).
pub const RASTER_METHOD: u8 = 6;

/// Standard deviation of the DEM error smoothing kernel, in cells.
const DEM_SMOOTHING_SIGMA: f64 = 1.0;

/// Kernel half-width in standard deviations.
const DEM_SMOOTHING_TRUNCATE: f64 = 4.0;

/// Parameters for the true terrain surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainParams {
    /// Autocorrelation method (1..=5), or 6 for an imported raster
    pub method: u8,

    /// Correlation length along x (metres)
    pub x_corr_len: f64,

    /// Correlation length along y (metres)
    pub y_corr_len: f64,

    /// Highest elevation after rescaling
    pub max_elevation: f64,

    /// Lowest elevation after rescaling
    pub min_elevation: f64,

    /// Generator seed
    pub seed: i64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            method: 1,
            x_corr_len: 100.0,
            y_corr_len: 100.0,
            max_elevation: 50.0,
            min_elevation: 0.0,
            seed: -1,
        }
    }
}

/// Maps `values` linearly onto `[min, max]`.
///
/// A constant input maps to `min`. NaN values are ignored when finding the
/// input range and stay NaN.
pub fn affine_rescale(values: &[f64], min: f64, max: f64) -> Vec<f64> {
    let range = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });

    match range {
        None => values.to_vec(),
        Some((lo, hi)) if lo == hi => values.iter().map(|v| if v.is_nan() { *v } else { min }).collect(),
        Some((lo, hi)) => {
            let m = (max - min) / (hi - lo);
            let b = min - m * lo;
            values.iter().map(|&v| m * v + b).collect()
        }
    }
}

/// Index into `0..n` with half-sample symmetric reflection at both ends.
fn reflect(index: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut i = index.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}

fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    let radius = (truncate * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Separable Gaussian smoothing of a row-major `rows x cols` array with
/// reflecting edges.
pub fn gaussian_filter(values: &[f64], rows: usize, cols: usize, sigma: f64) -> Vec<f64> {
    let kernel = gaussian_kernel(sigma, DEM_SMOOTHING_TRUNCATE);
    let radius = (kernel.len() / 2) as isize;

    let mut along_x = vec![0.0; values.len()];
    for r in 0..rows {
        for c in 0..cols {
            along_x[r * cols + c] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * values[r * cols + reflect(c as isize + k as isize - radius, cols)])
                .sum();
        }
    }

    let mut out = vec![0.0; values.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[r * cols + c] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * along_x[reflect(r as isize + k as isize - radius, rows) * cols + c])
                .sum();
        }
    }
    out
}

/// Synthesises the true terrain through the external generator.
pub fn generate_terrain(
    grid: &Arc<Grid>,
    generator: &dyn TerrainGenerator,
    params: &TerrainParams,
) -> Result<GridField> {
    const STAGE: &str = "generate_terrain";

    if params.max_elevation < params.min_elevation {
        return Err(PipelineError::invalid(
            STAGE,
            format!(
                "max elevation {} is below min elevation {}",
                params.max_elevation, params.min_elevation
            ),
        ));
    }

    let request = TerrainRequest {
        method: params.method,
        seed: params.seed,
        x_corr_len: params.x_corr_len,
        y_corr_len: params.y_corr_len,
        rows: grid.rows(),
        cols: grid.cols(),
        resolution: grid.resolution(),
    };
    let raw = generator
        .generate(&request)
        .map_err(|e| PipelineError::generator(STAGE, e))?;

    if (raw.rows, raw.cols) != grid.shape() || raw.values.len() != grid.len() {
        return Err(PipelineError::GeneratorUnavailable {
            stage: STAGE,
            reason: format!(
                "{} returned a {}x{} raster for a {}x{} grid",
                generator.name(),
                raw.rows,
                raw.cols,
                grid.rows(),
                grid.cols()
            ),
        });
    }

    let elevations = affine_rescale(&raw.values, params.min_elevation, params.max_elevation);
    GridField::new(Arc::clone(grid), elevations)
}

/// Uses resampled raster elevations as the true terrain, unscaled.
pub fn raster_terrain(grid: &Arc<Grid>, elevations: &[f64]) -> Result<GridField> {
    if elevations.len() != grid.len() {
        return Err(PipelineError::GeneratorUnavailable {
            stage: "generate_terrain",
            reason: format!(
                "raster holds {} elevations for a {}x{} grid",
                elevations.len(),
                grid.rows(),
                grid.cols()
            ),
        });
    }
    GridField::new(Arc::clone(grid), elevations.to_vec())
}

/// Derives the measured surface: true terrain plus smoothed error bounded
/// by `error_bound`.
pub fn generate_dem(terrain: &GridField, error_bound: f64, seed: u64) -> Result<GridField> {
    if !(error_bound.is_finite() && error_bound >= 0.0) {
        return Err(PipelineError::invalid(
            "generate_dem",
            format!("DTM error must be finite and non-negative, got {}", error_bound),
        ));
    }

    let (rows, cols) = terrain.shape();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let white: Vec<f64> = (0..rows * cols).map(|_| StandardNormal.sample(&mut rng)).collect();
    let smooth = gaussian_filter(&white, rows, cols, DEM_SMOOTHING_SIGMA);
    let error = affine_rescale(&smooth, -error_bound, error_bound);

    let values = terrain
        .values()
        .iter()
        .zip(&error)
        .map(|(z, e)| z + e)
        .collect();
    GridField::new(Arc::clone(terrain.grid()), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use grasim_env::{CorrelatedFieldGenerator, EnvError, RawRaster};

    fn grid() -> Arc<Grid> {
        Arc::new(Grid::manual(10.0, 0.0, 0.0, 200.0, 150.0).unwrap())
    }

    struct WrongShape;

    impl TerrainGenerator for WrongShape {
        fn generate(&self, request: &TerrainRequest) -> std::result::Result<RawRaster, EnvError> {
            RawRaster::new(request.rows + 1, request.cols, vec![0.0; (request.rows + 1) * request.cols])
        }

        fn name(&self) -> &str {
            "wrong-shape"
        }
    }

    #[test]
    fn test_affine_rescale() {
        let out = affine_rescale(&[-2.0, 0.0, 2.0], 10.0, 20.0);
        assert_eq!(out, vec![10.0, 15.0, 20.0]);

        let flat = affine_rescale(&[3.0, 3.0, 3.0], 10.0, 20.0);
        assert_eq!(flat, vec![10.0; 3]);
    }

    #[test]
    fn test_reflect_indexing() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(6, 5), 3);
        assert_eq!(reflect(2, 5), 2);
    }

    #[test]
    fn test_gaussian_filter_preserves_constant() {
        let out = gaussian_filter(&[4.0; 30], 5, 6, 1.0);
        for v in out {
            assert_relative_eq!(v, 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gaussian_filter_smooths_spike() {
        let mut values = vec![0.0; 81];
        values[40] = 1.0;
        let out = gaussian_filter(&values, 9, 9, 1.0);

        assert!(out[40] < 1.0);
        assert!(out[41] > 0.0);
        assert_relative_eq!(out.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_terrain_spans_requested_range() {
        let g = grid();
        let params = TerrainParams {
            max_elevation: 80.0,
            min_elevation: 20.0,
            ..TerrainParams::default()
        };
        let terrain = generate_terrain(&g, &CorrelatedFieldGenerator::new(), &params).unwrap();

        assert_eq!(terrain.shape(), g.shape());
        let (lo, hi) = terrain.finite_range().unwrap();
        assert_relative_eq!(lo, 20.0, epsilon = 1e-9);
        assert_relative_eq!(hi, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_terrain_rejects_wrong_shape() {
        let result = generate_terrain(&grid(), &WrongShape, &TerrainParams::default());
        assert!(matches!(result, Err(PipelineError::GeneratorUnavailable { .. })));
    }

    #[test]
    fn test_terrain_rejects_unknown_method() {
        let params = TerrainParams {
            method: RASTER_METHOD,
            ..TerrainParams::default()
        };
        let result = generate_terrain(&grid(), &CorrelatedFieldGenerator::new(), &params);
        assert!(matches!(result, Err(PipelineError::GeneratorUnavailable { .. })));
    }

    #[test]
    fn test_zero_dem_error_copies_terrain() {
        let terrain = generate_terrain(&grid(), &CorrelatedFieldGenerator::new(), &TerrainParams::default()).unwrap();
        let dem = generate_dem(&terrain, 0.0, 3).unwrap();
        assert_eq!(dem.values(), terrain.values());
    }

    #[test]
    fn test_dem_error_is_bounded() {
        let terrain = generate_terrain(&grid(), &CorrelatedFieldGenerator::new(), &TerrainParams::default()).unwrap();
        let dem = generate_dem(&terrain, 2.5, 3).unwrap();

        let mut max_diff: f64 = 0.0;
        for (d, t) in dem.values().iter().zip(terrain.values()) {
            max_diff = max_diff.max((d - t).abs());
        }
        assert!(max_diff <= 2.5 + 1e-9);
        assert_relative_eq!(max_diff, 2.5, epsilon = 1e-9);

        let again = generate_dem(&terrain, 2.5, 3).unwrap();
        assert_eq!(dem.values(), again.values());
    }

    #[test]
    fn test_raster_terrain_checks_length() {
        let g = grid();
        assert!(raster_terrain(&g, &[0.0; 3]).is_err());
        let field = raster_terrain(&g, &vec![7.0; g.len()]).unwrap();
        assert_eq!(field.finite_range(), Some((7.0, 7.0)));
    }
}
