//! The datum: an immutable rectangular observation grid.
//!
//! Rows follow y and columns follow x. Every grid-shaped array in the
//! pipeline is raveled row-major, `index = row * cols + col`.

use crate::error::{PipelineError, Result};
use grasim_env::{BoundingBox, ElevationRaster};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

const STAGE: &str = "create_datum";

/// Tolerance for deciding that a resolution ratio is integral.
const RATIO_EPSILON: f64 = 1e-9;

/// How the datum extent is chosen.
#[derive(Debug, Clone)]
pub enum Extent {
    /// Model bounds (rounded to whole metres) scaled by a multiplier
    Auto { multiplier: f64 },

    /// Explicit rectangle, upper bounds inclusive
    Manual { x1: f64, y1: f64, x2: f64, y2: f64 },

    /// Resampled external raster, coordinates re-based at the origin
    Raster {
        raster: ElevationRaster,
        raster_resolution: f64,
    },
}

/// `numpy.arange` semantics: `ceil((stop - start) / step)` samples.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let n = ((stop - start) / step).ceil();
    if !n.is_finite() || n <= 0.0 {
        return Vec::new();
    }
    (0..n as usize).map(|k| start + k as f64 * step).collect()
}

/// Checks that `resolution / raster_resolution` is a positive integer.
pub fn resample_stride(resolution: f64, raster_resolution: f64) -> Result<usize> {
    let ratio = resolution / raster_resolution;
    let rounded = ratio.round();
    if !ratio.is_finite() || rounded < 1.0 || (ratio - rounded).abs() > RATIO_EPSILON {
        return Err(PipelineError::InvalidResolutionRatio {
            stage: STAGE,
            resolution,
            raster_resolution,
        });
    }
    Ok(rounded as usize)
}

/// Immutable 2D coordinate mesh at z = 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Column coordinates (x)
    x_axis: Vec<f64>,

    /// Row coordinates (y)
    y_axis: Vec<f64>,

    /// Raveled x of every node
    xs: Vec<f64>,

    /// Raveled y of every node
    ys: Vec<f64>,

    /// Node spacing in metres
    resolution: f64,
}

impl Grid {
    /// Builds a grid from its two axes (meshgrid).
    pub fn from_axes(x_axis: Vec<f64>, y_axis: Vec<f64>, resolution: f64) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(PipelineError::invalid(
                STAGE,
                format!("resolution must be positive, got {}", resolution),
            ));
        }
        if x_axis.is_empty() || y_axis.is_empty() {
            return Err(PipelineError::shape(STAGE, (1, 1), (y_axis.len(), x_axis.len())));
        }

        let rows = y_axis.len();
        let cols = x_axis.len();
        let mut xs = Vec::with_capacity(rows * cols);
        let mut ys = Vec::with_capacity(rows * cols);
        for &y in &y_axis {
            for &x in &x_axis {
                xs.push(x);
                ys.push(y);
            }
        }

        Ok(Self {
            x_axis,
            y_axis,
            xs,
            ys,
            resolution,
        })
    }

    /// Creates the datum for any extent mode.
    ///
    /// `model_bounds` is required in `Auto` mode and ignored otherwise.
    pub fn create(resolution: f64, extent: &Extent, model_bounds: Option<&BoundingBox>) -> Result<Self> {
        match extent {
            Extent::Auto { multiplier } => {
                let bounds = model_bounds.ok_or_else(|| PipelineError::missing(STAGE, "model bounds"))?;
                Self::auto(resolution, bounds, *multiplier)
            }
            Extent::Manual { x1, y1, x2, y2 } => Self::manual(resolution, *x1, *y1, *x2, *y2),
            Extent::Raster {
                raster,
                raster_resolution,
            } => Self::from_raster(resolution, raster, *raster_resolution).map(|(grid, _)| grid),
        }
    }

    /// Auto mode: rounded model bounds scaled by `multiplier`.
    pub fn auto(resolution: f64, model_bounds: &BoundingBox, multiplier: f64) -> Result<Self> {
        Self::check_resolution(resolution)?;
        let bounds = model_bounds.rounded().scaled(multiplier);
        let x = arange(bounds.min.x, bounds.max.x, resolution);
        let y = arange(bounds.min.y, bounds.max.y, resolution);
        Self::from_axes(x, y, resolution)
    }

    /// Manual mode: explicit rectangle with inclusive upper bounds.
    pub fn manual(resolution: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        Self::check_resolution(resolution)?;
        let x = arange(x1, x2 + resolution, resolution);
        let y = arange(y1, y2 + resolution, resolution);
        Self::from_axes(x, y, resolution)
    }

    /// Raster mode: resample an imported raster at integer stride.
    ///
    /// Returns the grid together with the resampled elevations.
    pub fn from_raster(
        resolution: f64,
        raster: &ElevationRaster,
        raster_resolution: f64,
    ) -> Result<(Self, Vec<f64>)> {
        Self::check_resolution(resolution)?;
        let stride = resample_stride(resolution, raster_resolution)?;

        let x_full = arange(0.0, raster.x_span() + raster_resolution, raster_resolution);
        let y_full = arange(0.0, raster.y_span() + raster_resolution, raster_resolution);
        let x: Vec<f64> = x_full.into_iter().step_by(stride).collect();
        let y: Vec<f64> = y_full.into_iter().step_by(stride).collect();

        let (rows, cols, elevations) = raster
            .resample(stride)
            .map_err(|e| PipelineError::generator(STAGE, e))?;
        if rows != y.len() || cols != x.len() {
            return Err(PipelineError::shape(STAGE, (y.len(), x.len()), (rows, cols)));
        }

        Ok((Self::from_axes(x, y, resolution)?, elevations))
    }

    fn check_resolution(resolution: f64) -> Result<()> {
        if resolution.is_finite() && resolution > 0.0 {
            Ok(())
        } else {
            Err(PipelineError::invalid(
                STAGE,
                format!("resolution must be positive, got {}", resolution),
            ))
        }
    }

    /// Number of rows (y samples).
    pub fn rows(&self) -> usize {
        self.y_axis.len()
    }

    /// Number of columns (x samples).
    pub fn cols(&self) -> usize {
        self.x_axis.len()
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Always false for a constructed grid.
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Node spacing.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Column coordinates.
    pub fn x_axis(&self) -> &[f64] {
        &self.x_axis
    }

    /// Row coordinates.
    pub fn y_axis(&self) -> &[f64] {
        &self.y_axis
    }

    /// Raveled x coordinates.
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Raveled y coordinates.
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// x coordinates as a rows x cols matrix.
    pub fn x_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.rows(), self.cols(), &self.xs)
    }

    /// y coordinates as a rows x cols matrix.
    pub fn y_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.rows(), self.cols(), &self.ys)
    }

    /// `[x_min, y_min, x_max, y_max]`.
    pub fn bounds(&self) -> [f64; 4] {
        let (x_min, x_max) = min_max(&self.x_axis);
        let (y_min, y_max) = min_max(&self.y_axis);
        [x_min, y_min, x_max, y_max]
    }

    /// Raveled index of `(row, col)`.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols() + col
    }

    /// Exact-match lookup of a node: first column with x equal to `x`,
    /// first row with y equal to `y`.
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = self.x_axis.iter().position(|&v| v == x)?;
        let row = self.y_axis.iter().position(|&v| v == y)?;
        Some((row, col))
    }

    /// Grid node nearest to `(x, y)` (ties go to the lower index).
    pub fn nearest_node(&self, x: f64, y: f64) -> (usize, usize) {
        (nearest_index(&self.y_axis, y), nearest_index(&self.x_axis, x))
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn nearest_index(axis: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &a) in axis.iter().enumerate() {
        let d = (a - value).abs();
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_arange_matches_numpy() {
        assert_eq!(arange(0.0, 30.0, 10.0), vec![0.0, 10.0, 20.0]);
        assert_eq!(arange(0.0, 31.0, 10.0), vec![0.0, 10.0, 20.0, 30.0]);
        assert!(arange(5.0, 5.0, 1.0).is_empty());
    }

    #[test]
    fn test_manual_extent_is_inclusive() {
        let grid = Grid::manual(10.0, 0.0, 0.0, 20.0, 30.0).unwrap();
        assert_eq!(grid.shape(), (4, 3));
        assert_eq!(grid.bounds(), [0.0, 0.0, 20.0, 30.0]);
        assert_eq!(grid.resolution(), 10.0);

        // Row-major raveling: x varies fastest
        assert_eq!(&grid.xs()[0..3], &[0.0, 10.0, 20.0]);
        assert_eq!(&grid.ys()[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(grid.ys()[3], 10.0);
    }

    #[test]
    fn test_matrix_views_are_consistent() {
        let grid = Grid::manual(5.0, -10.0, -5.0, 10.0, 5.0).unwrap();
        let xm = grid.x_matrix();
        let ym = grid.y_matrix();
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                assert_eq!(xm[(row, col)], grid.xs()[grid.index(row, col)]);
                assert_eq!(ym[(row, col)], grid.y_axis()[row]);
            }
        }
    }

    #[test]
    fn test_auto_extent_scales_rounded_bounds() {
        let bounds = BoundingBox::new(Vector3::new(-50.2, -49.7, -150.0), Vector3::new(50.2, 49.7, -50.0));
        let grid = Grid::auto(10.0, &bounds, 2.0).unwrap();
        assert_eq!(grid.x_axis().first(), Some(&-100.0));
        assert_eq!(grid.x_axis().last(), Some(&90.0));
        assert_eq!(grid.shape(), (20, 20));
    }

    #[test]
    fn test_auto_extent_requires_bounds() {
        let result = Grid::create(10.0, &Extent::Auto { multiplier: 2.0 }, None);
        assert!(matches!(result, Err(PipelineError::MissingPrerequisite { .. })));
    }

    #[test]
    fn test_raster_extent_resamples() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for j in 0..5 {
            for i in 0..5 {
                xs.push(100.0 + i as f64 * 2.0);
                ys.push(200.0 + j as f64 * 2.0);
                zs.push((j * 5 + i) as f64);
            }
        }
        let raster = ElevationRaster::from_triples(xs, ys, zs).unwrap();

        let (grid, elevations) = Grid::from_raster(4.0, &raster, 2.0).unwrap();
        assert_eq!(grid.shape(), (3, 3));
        assert_eq!(grid.x_axis(), &[0.0, 4.0, 8.0]);
        assert_eq!(elevations, vec![0.0, 2.0, 4.0, 10.0, 12.0, 14.0, 20.0, 22.0, 24.0]);
    }

    #[test]
    fn test_raster_rejects_fractional_ratio() {
        let raster = ElevationRaster::from_triples(vec![0.0; 4], vec![0.0; 4], vec![0.0; 4]).unwrap();
        let result = Grid::from_raster(3.0, &raster, 2.0);
        assert!(matches!(result, Err(PipelineError::InvalidResolutionRatio { .. })));

        let result = Grid::from_raster(1.0, &raster, 2.0);
        assert!(matches!(result, Err(PipelineError::InvalidResolutionRatio { .. })));
    }

    #[test]
    fn test_locate_exact_nodes_only() {
        let grid = Grid::manual(10.0, 0.0, 0.0, 20.0, 20.0).unwrap();
        assert_eq!(grid.locate(10.0, 20.0), Some((2, 1)));
        assert_eq!(grid.locate(10.5, 20.0), None);
        assert_eq!(grid.nearest_node(12.0, 17.0), (2, 1));
    }

    #[test]
    fn test_rejects_bad_resolution() {
        assert!(matches!(
            Grid::manual(0.0, 0.0, 0.0, 1.0, 1.0),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }
}
