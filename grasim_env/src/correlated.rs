//! Reference terrain generator backed by filtered white noise.

use crate::error::EnvError;
use crate::terrain::{RawRaster, TerrainGenerator, TerrainRequest};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Kernel support in correlation lengths.
const KERNEL_REACH: f64 = 3.0;

/// Autocorrelation families understood by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Autocorrelation {
    /// Method 1: Gaussian, x correlation length on both axes
    IsotropicGaussian,

    /// Method 2: Gaussian with independent x/y correlation lengths
    Gaussian,

    /// Method 3: exponential
    Exponential,

    /// Method 4: von Kármán (Matérn, nu = 3/2)
    VonKarman,

    /// Method 5: Cauchy
    Cauchy,
}

impl Autocorrelation {
    /// Maps a numeric method code to a family.
    pub fn from_method(method: u8) -> Result<Self, EnvError> {
        match method {
            1 => Ok(Self::IsotropicGaussian),
            2 => Ok(Self::Gaussian),
            3 => Ok(Self::Exponential),
            4 => Ok(Self::VonKarman),
            5 => Ok(Self::Cauchy),
            other => Err(EnvError::UnsupportedMethod(other)),
        }
    }

    /// Returns the numeric method code.
    pub fn method(&self) -> u8 {
        match self {
            Self::IsotropicGaussian => 1,
            Self::Gaussian => 2,
            Self::Exponential => 3,
            Self::VonKarman => 4,
            Self::Cauchy => 5,
        }
    }

    /// Kernel weight at normalised lag `r` (lag / correlation length).
    pub fn weight(&self, r: f64) -> f64 {
        match self {
            Self::IsotropicGaussian | Self::Gaussian => (-r * r).exp(),
            Self::Exponential => (-r).exp(),
            Self::VonKarman => {
                let s = 3f64.sqrt() * r;
                (1.0 + s) * (-s).exp()
            }
            Self::Cauchy => 1.0 / (1.0 + r * r),
        }
    }
}

/// Moving-average random-field generator.
///
/// Seeded standard-normal white noise is convolved with the chosen
/// autocorrelation kernel. The noise is padded by the kernel reach on
/// every side so edge cells are as rough as interior ones.
///
/// Determinism: the same request always yields bit-identical output.
#[derive(Debug, Clone, Default)]
pub struct CorrelatedFieldGenerator;

impl CorrelatedFieldGenerator {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self
    }

    fn reach_cells(corr_len: f64, resolution: f64, limit: usize) -> usize {
        let cells = (KERNEL_REACH * corr_len / resolution).ceil() as usize;
        cells.clamp(1, limit.max(1))
    }
}

impl TerrainGenerator for CorrelatedFieldGenerator {
    fn generate(&self, request: &TerrainRequest) -> Result<RawRaster, EnvError> {
        let family = Autocorrelation::from_method(request.method)?;

        if request.rows == 0 || request.cols == 0 {
            return Err(EnvError::shape(format!(
                "cannot synthesise a {}x{} raster",
                request.rows, request.cols
            )));
        }
        if !(request.resolution.is_finite() && request.resolution > 0.0) {
            return Err(EnvError::invalid(format!(
                "resolution must be positive, got {}",
                request.resolution
            )));
        }

        let lx = request.x_corr_len;
        let ly = match family {
            Autocorrelation::IsotropicGaussian => request.x_corr_len,
            _ => request.y_corr_len,
        };
        if !(lx.is_finite() && lx > 0.0 && ly.is_finite() && ly > 0.0) {
            return Err(EnvError::invalid(format!(
                "correlation lengths must be positive, got ({}, {})",
                lx, ly
            )));
        }

        let rx = Self::reach_cells(lx, request.resolution, request.cols);
        let ry = Self::reach_cells(ly, request.resolution, request.rows);

        // Kernel, row-major over (2ry+1) x (2rx+1)
        let kw = 2 * rx + 1;
        let kh = 2 * ry + 1;
        let mut kernel = Vec::with_capacity(kw * kh);
        for j in 0..kh {
            let dy = (j as f64 - ry as f64) * request.resolution / ly;
            for i in 0..kw {
                let dx = (i as f64 - rx as f64) * request.resolution / lx;
                kernel.push(family.weight((dx * dx + dy * dy).sqrt()));
            }
        }

        // Padded white noise
        let pw = request.cols + 2 * rx;
        let ph = request.rows + 2 * ry;
        let mut rng = ChaCha8Rng::seed_from_u64(request.seed as u64);
        let noise: Vec<f64> = (0..pw * ph)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect();

        let mut values = Vec::with_capacity(request.rows * request.cols);
        for row in 0..request.rows {
            for col in 0..request.cols {
                let mut acc = 0.0;
                for j in 0..kh {
                    let base = (row + j) * pw + col;
                    let krow = &kernel[j * kw..(j + 1) * kw];
                    for (i, w) in krow.iter().enumerate() {
                        acc += w * noise[base + i];
                    }
                }
                values.push(acc);
            }
        }

        RawRaster::new(request.rows, request.cols, values)
    }

    fn name(&self) -> &str {
        "correlated-moving-average"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: u8, seed: i64) -> TerrainRequest {
        TerrainRequest {
            method,
            seed,
            x_corr_len: 20.0,
            y_corr_len: 40.0,
            rows: 12,
            cols: 9,
            resolution: 10.0,
        }
    }

    #[test]
    fn test_generator_shape() {
        let raster = CorrelatedFieldGenerator::new().generate(&request(2, -7)).unwrap();
        assert_eq!(raster.rows, 12);
        assert_eq!(raster.cols, 9);
        assert_eq!(raster.values.len(), 108);
    }

    #[test]
    fn test_generator_deterministic() {
        let gen = CorrelatedFieldGenerator::new();
        let a = gen.generate(&request(3, -42)).unwrap();
        let b = gen.generate(&request(3, -42)).unwrap();
        assert_eq!(a, b);

        let c = gen.generate(&request(3, -43)).unwrap();
        assert_ne!(a.values, c.values);
    }

    #[test]
    fn test_generator_rejects_unknown_method() {
        let result = CorrelatedFieldGenerator::new().generate(&request(6, -1));
        assert!(matches!(result, Err(EnvError::UnsupportedMethod(6))));
    }

    #[test]
    fn test_generator_rejects_empty_shape() {
        let mut req = request(1, -1);
        req.rows = 0;
        assert!(matches!(
            CorrelatedFieldGenerator::new().generate(&req),
            Err(EnvError::Shape(_))
        ));
    }

    #[test]
    fn test_kernels_peak_at_zero_lag() {
        for method in 1..=5 {
            let family = Autocorrelation::from_method(method).unwrap();
            assert_eq!(family.method(), method);
            assert!((family.weight(0.0) - 1.0).abs() < 1e-12);
            assert!(family.weight(1.0) < family.weight(0.5));
        }
    }
}
