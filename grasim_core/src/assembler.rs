//! Gravity assembly: kernels evaluated over the datum.

use crate::error::Result;
use crate::field::GridField;
use crate::grid::Grid;
use crate::kernels;
use crate::noise::{add_noise, NoiseChannel, NoiseSeeds};
use grasim_env::VoxelSet;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the target sits under.
#[derive(Debug, Clone, Copy)]
pub enum Background<'a> {
    /// Observations at z = 0, no terrain signal
    Flat,

    /// Observations on the true surface, terrain gravity superposed
    Terrain {
        elevation: &'a GridField,
        gravity: &'a GridField,
    },
}

/// Instrument error budget for a noisy realisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseOptions {
    /// Gravimeter error bound (mGal)
    pub gravity_error: f64,

    /// GPS position error bound (m)
    pub gps_error: f64,

    /// Base seed for the position and reading channels
    pub seeds: NoiseSeeds,
}

/// Which realisation of a computed field to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Realisation {
    Clean,
    Noisy,
}

/// Clean target gravity plus, when requested, a noisy realisation.
#[derive(Debug, Clone)]
pub struct TargetGravity {
    pub clean: GridField,
    pub noisy: Option<GridField>,
}

impl TargetGravity {
    /// Reads one realisation.
    pub fn select(&self, realisation: Realisation) -> Option<&GridField> {
        match realisation {
            Realisation::Clean => Some(&self.clean),
            Realisation::Noisy => self.noisy.as_ref(),
        }
    }
}

/// Gravity of the target voxels over the datum.
///
/// With terrain, the observation heights follow the true surface and the
/// terrain field is added as background. With noise, the horizontal
/// positions are perturbed before evaluation and the target readings
/// afterwards; the background itself carries no noise.
pub fn compute_target_gravity(
    grid: &Arc<Grid>,
    voxels: &VoxelSet,
    density: f64,
    background: Background<'_>,
    noise: Option<&NoiseOptions>,
) -> Result<TargetGravity> {
    let (zs, offset) = match background {
        Background::Flat => (vec![0.0; grid.len()], None),
        Background::Terrain { elevation, gravity } => (elevation.values().to_vec(), Some(gravity.values())),
    };

    let with_background = |mut values: Vec<f64>| -> Vec<f64> {
        if let Some(offset) = offset {
            for (v, o) in values.iter_mut().zip(offset) {
                *v += o;
            }
        }
        values
    };

    let signal = kernels::voxel_gravity_field(voxels, density, grid.xs(), grid.ys(), &zs);
    let clean = GridField::new(Arc::clone(grid), with_background(signal))?;

    // Readings are perturbed before the background is superposed
    let noisy = match noise {
        None => None,
        Some(options) => {
            let xs = add_noise(grid.xs(), options.gps_error, options.seeds.channel(NoiseChannel::PositionX))?;
            let ys = add_noise(grid.ys(), options.gps_error, options.seeds.channel(NoiseChannel::PositionY))?;
            let signal = kernels::voxel_gravity_field(voxels, density, &xs, &ys, &zs);
            let readings = add_noise(&signal, options.gravity_error, options.seeds.channel(NoiseChannel::Reading))?;
            Some(GridField::new(Arc::clone(grid), with_background(readings))?)
        }
    };

    Ok(TargetGravity { clean, noisy })
}

/// Terrain gravity of an elevation surface.
pub fn compute_terrain_gravity(elevation: &GridField, density: f64) -> Result<GridField> {
    let grid = elevation.grid();
    let values = kernels::terrain_gravity(grid.xs(), grid.ys(), elevation.values(), grid.resolution(), density);
    GridField::new(Arc::clone(grid), values)
}

/// Analytical sphere gravity over the flat datum.
pub fn compute_analytical_sphere(
    grid: &Arc<Grid>,
    density: f64,
    radius: f64,
    center: &Vector3<f64>,
) -> Result<GridField> {
    let values = grid
        .xs()
        .iter()
        .zip(grid.ys())
        .map(|(&x, &y)| kernels::sphere_gravity(density, radius, center, x, y, 0.0))
        .collect();
    GridField::new(Arc::clone(grid), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn setup() -> (Arc<Grid>, VoxelSet) {
        let grid = Arc::new(Grid::manual(20.0, -100.0, -100.0, 100.0, 100.0).unwrap());
        let voxels = VoxelSet::new(vec![Vector3::new(0.0, 0.0, -40.0)], 20.0).unwrap();
        (grid, voxels)
    }

    #[test]
    fn test_flat_target_peaks_over_voxel() {
        let (grid, voxels) = setup();
        let result = compute_target_gravity(&grid, &voxels, 500.0, Background::Flat, None).unwrap();
        assert!(result.noisy.is_none());

        let (row, col) = grid.locate(0.0, 0.0).unwrap();
        let peak = result.clean.get(row, col);
        let (_, hi) = result.clean.finite_range().unwrap();
        assert_eq!(peak, hi);
    }

    #[test]
    fn test_terrain_background_is_added() {
        let (grid, voxels) = setup();
        let elevation = GridField::zeros(Arc::clone(&grid));
        let gravity = GridField::new(Arc::clone(&grid), vec![1.5; grid.len()]).unwrap();

        let flat = compute_target_gravity(&grid, &voxels, 500.0, Background::Flat, None).unwrap();
        let full = compute_target_gravity(
            &grid,
            &voxels,
            500.0,
            Background::Terrain {
                elevation: &elevation,
                gravity: &gravity,
            },
            None,
        )
        .unwrap();

        for (f, t) in full.clean.values().iter().zip(flat.clean.values()) {
            assert_relative_eq!(*f, t + 1.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_noise_keeps_clean_realisation() {
        let (grid, voxels) = setup();
        let options = NoiseOptions {
            gravity_error: 0.05,
            gps_error: 1.0,
            seeds: NoiseSeeds::default(),
        };
        let plain = compute_target_gravity(&grid, &voxels, 500.0, Background::Flat, None).unwrap();
        let noisy = compute_target_gravity(&grid, &voxels, 500.0, Background::Flat, Some(&options)).unwrap();

        assert_eq!(noisy.clean.values(), plain.clean.values());
        let realisation = noisy.select(Realisation::Noisy).unwrap();
        assert_ne!(realisation.values(), plain.clean.values());

        let again = compute_target_gravity(&grid, &voxels, 500.0, Background::Flat, Some(&options)).unwrap();
        assert_eq!(again.noisy.unwrap().values(), realisation.values());
    }

    #[test]
    fn test_analytical_sphere_field() {
        let (grid, _) = setup();
        let center = Vector3::new(0.0, 0.0, -100.0);
        let field = compute_analytical_sphere(&grid, 1000.0, 50.0, &center).unwrap();

        let (row, col) = grid.locate(0.0, 0.0).unwrap();
        assert_relative_eq!(field.get(row, col), 0.349_449_822_834, epsilon = 1e-6);
    }

    #[test]
    fn test_flat_terrain_field_is_zero() {
        let (grid, _) = setup();
        let elevation = GridField::new(Arc::clone(&grid), vec![12.0; grid.len()]).unwrap();
        let field = compute_terrain_gravity(&elevation, 2670.0).unwrap();
        assert!(field.values().iter().all(|&v| v == 0.0));
    }
}
