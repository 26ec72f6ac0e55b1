//! Imported elevation rasters.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A square elevation raster read from an `x y z` text file.
///
/// Values are stored row-major in file order, so `z[row * side + col]`
/// is the elevation of the `row`-th y sample and `col`-th x sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationRaster {
    /// Number of samples along each axis
    side: usize,

    /// Raw x coordinates in file order
    xs: Vec<f64>,

    /// Raw y coordinates in file order
    ys: Vec<f64>,

    /// Elevations in file order (metres)
    zs: Vec<f64>,
}

impl ElevationRaster {
    /// Builds a raster from parallel coordinate vectors.
    pub fn from_triples(xs: Vec<f64>, ys: Vec<f64>, zs: Vec<f64>) -> Result<Self, EnvError> {
        if xs.len() != ys.len() || ys.len() != zs.len() {
            return Err(EnvError::shape(format!(
                "coordinate columns differ in length: x={}, y={}, z={}",
                xs.len(),
                ys.len(),
                zs.len()
            )));
        }
        let side = (xs.len() as f64).sqrt().round() as usize;
        if side == 0 || side * side != xs.len() {
            return Err(EnvError::shape(format!(
                "raster with {} samples is not square",
                xs.len()
            )));
        }
        Ok(Self { side, xs, ys, zs })
    }

    /// Parses whitespace-delimited `x y z` triples, one per line.
    ///
    /// Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, EnvError> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(EnvError::parse(
                    idx + 1,
                    format!("expected 3 columns, found {}", fields.len()),
                ));
            }

            let mut parsed = [0.0; 3];
            for (slot, field) in parsed.iter_mut().zip(&fields) {
                *slot = field
                    .parse::<f64>()
                    .map_err(|e| EnvError::parse(idx + 1, format!("{:?}: {}", field, e)))?;
            }
            xs.push(parsed[0]);
            ys.push(parsed[1]);
            zs.push(parsed[2]);
        }

        Self::from_triples(xs, ys, zs)
    }

    /// Reads a raster file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Samples per axis.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Extent of the x coordinates (max - min).
    pub fn x_span(&self) -> f64 {
        span(&self.xs)
    }

    /// Extent of the y coordinates (max - min).
    pub fn y_span(&self) -> f64 {
        span(&self.ys)
    }

    /// Elevations in file (row-major) order.
    pub fn elevations(&self) -> &[f64] {
        &self.zs
    }

    /// Takes every `stride`-th sample along both axes.
    ///
    /// Returns `(rows, cols, values)` with values row-major.
    pub fn resample(&self, stride: usize) -> Result<(usize, usize, Vec<f64>), EnvError> {
        if stride == 0 {
            return Err(EnvError::invalid("resample stride must be at least 1"));
        }
        let n = self.side.div_ceil(stride);
        let mut values = Vec::with_capacity(n * n);
        for row in (0..self.side).step_by(stride) {
            for col in (0..self.side).step_by(stride) {
                values.push(self.zs[row * self.side + col]);
            }
        }
        Ok((n, n, values))
    }
}

fn span(values: &[f64]) -> f64 {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    hi - lo
}
