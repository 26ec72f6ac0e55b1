//! Reference voxelizer for implicit primitives.

use crate::error::EnvError;
use crate::geometry::{GeometrySource, VoxelSet};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Implicit solids that can be voxelized without a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ImplicitSolid {
    /// Sphere of `radius` about `center`
    Sphere { center: Vector3<f64>, radius: f64 },

    /// Cylinder with its axis along x, `length` long
    Cylinder {
        center: Vector3<f64>,
        radius: f64,
        length: f64,
    },
}

impl ImplicitSolid {
    fn contains(&self, p: &Vector3<f64>) -> bool {
        match *self {
            ImplicitSolid::Sphere { center, radius } => (p - center).norm_squared() <= radius * radius,
            ImplicitSolid::Cylinder { center, radius, length } => {
                let d = p - center;
                d.x.abs() <= length / 2.0 && d.y * d.y + d.z * d.z <= radius * radius
            }
        }
    }

    fn half_extents(&self) -> Vector3<f64> {
        match *self {
            ImplicitSolid::Sphere { radius, .. } => Vector3::repeat(radius),
            ImplicitSolid::Cylinder { radius, length, .. } => Vector3::new(length / 2.0, radius, radius),
        }
    }

    fn validate(&self) -> Result<(), EnvError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        match *self {
            ImplicitSolid::Sphere { radius, .. } if !positive(radius) => {
                Err(EnvError::invalid(format!("sphere radius must be positive, got {}", radius)))
            }
            ImplicitSolid::Cylinder { radius, length, .. } if !positive(radius) || !positive(length) => {
                Err(EnvError::invalid(format!(
                    "cylinder radius/length must be positive, got {}/{}",
                    radius, length
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Voxelizes an `ImplicitSolid` on a lattice aligned with its bounding box.
///
/// A cube is kept when its centre lies inside the solid.
#[derive(Debug, Clone)]
pub struct PrimitiveVoxelizer {
    solid: ImplicitSolid,
}

impl PrimitiveVoxelizer {
    /// Creates a voxelizer for the given solid.
    pub fn new(solid: ImplicitSolid) -> Self {
        Self { solid }
    }

    /// The wrapped solid.
    pub fn solid(&self) -> &ImplicitSolid {
        &self.solid
    }
}

impl GeometrySource for PrimitiveVoxelizer {
    fn voxelize(&self, edge: f64) -> Result<VoxelSet, EnvError> {
        self.solid.validate()?;
        if !(edge.is_finite() && edge > 0.0) {
            return Err(EnvError::invalid(format!("voxel edge must be positive, got {}", edge)));
        }

        let half = self.solid.half_extents();
        let origin = self.center() - half;
        let counts = (half * 2.0 / edge).map(|n| n.ceil().max(1.0) as usize);

        let mut centers = Vec::new();
        for k in 0..counts.z {
            for j in 0..counts.y {
                for i in 0..counts.x {
                    let p = origin
                        + Vector3::new(
                            (i as f64 + 0.5) * edge,
                            (j as f64 + 0.5) * edge,
                            (k as f64 + 0.5) * edge,
                        );
                    if self.solid.contains(&p) {
                        centers.push(p);
                    }
                }
            }
        }

        if centers.is_empty() {
            return Err(EnvError::shape(format!(
                "voxel edge {} is too coarse to resolve the solid",
                edge
            )));
        }
        VoxelSet::new(centers, edge)
    }

    fn center(&self) -> Vector3<f64> {
        match self.solid {
            ImplicitSolid::Sphere { center, .. } | ImplicitSolid::Cylinder { center, .. } => center,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_sphere_voxel_volume_converges() {
        let solid = ImplicitSolid::Sphere {
            center: Vector3::new(0.0, 0.0, -100.0),
            radius: 50.0,
        };
        let exact = 4.0 / 3.0 * PI * 50f64.powi(3);
        let voxelizer = PrimitiveVoxelizer::new(solid);

        let coarse = voxelizer.voxelize(10.0).unwrap();
        let fine = voxelizer.voxelize(5.0).unwrap();

        assert_eq!(coarse.len(), 552);
        assert_eq!(fine.len(), 4224);
        assert!((fine.volume() - exact).abs() < (coarse.volume() - exact).abs());
        assert_relative_eq!(fine.volume(), exact, max_relative = 0.02);
    }

    #[test]
    fn test_cylinder_is_axis_aligned_with_x() {
        let solid = ImplicitSolid::Cylinder {
            center: Vector3::new(0.0, 0.0, -50.0),
            radius: 10.0,
            length: 100.0,
        };
        let set = PrimitiveVoxelizer::new(solid).voxelize(5.0).unwrap();
        let bounds = set.bounds();
        assert_relative_eq!(bounds.max.x - bounds.min.x, 100.0);
        assert!(bounds.max.y - bounds.min.y <= 20.0);
    }

    #[test]
    fn test_rejects_bad_radius() {
        let solid = ImplicitSolid::Sphere {
            center: Vector3::zeros(),
            radius: -1.0,
        };
        assert!(PrimitiveVoxelizer::new(solid).voxelize(1.0).is_err());
    }
}
