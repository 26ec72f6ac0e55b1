//! Target geometry abstraction.

use crate::error::EnvError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl BoundingBox {
    /// Creates a box from two corners.
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// Rounds every bound to the nearest whole metre.
    pub fn rounded(&self) -> Self {
        Self {
            min: self.min.map(f64::round),
            max: self.max.map(f64::round),
        }
    }

    /// Multiplies every bound by `factor` (about the origin).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    /// Centre of the box.
    pub fn center(&self) -> Vector3<f64> {
        (self.min + self.max) * 0.5
    }
}

/// Discretised density anomaly: cubic voxels of a single edge length.
///
/// Opaque to the pipeline - it is only ever read as a list of prisms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelSet {
    /// Voxel centres (z negative below datum)
    centers: Vec<Vector3<f64>>,

    /// Cube edge length in metres
    edge: f64,

    /// Bounds of the voxelised solid
    bounds: BoundingBox,
}

impl VoxelSet {
    /// Creates a voxel set; bounds are derived from the voxel extents.
    pub fn new(centers: Vec<Vector3<f64>>, edge: f64) -> Result<Self, EnvError> {
        if !(edge.is_finite() && edge > 0.0) {
            return Err(EnvError::invalid(format!("voxel edge must be positive, got {}", edge)));
        }
        if centers.is_empty() {
            return Err(EnvError::shape("voxel set is empty"));
        }

        let half = Vector3::repeat(edge / 2.0);
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for c in &centers {
            min = min.inf(&(c - half));
            max = max.sup(&(c + half));
        }

        Ok(Self {
            centers,
            edge,
            bounds: BoundingBox::new(min, max),
        })
    }

    /// Voxel centres.
    pub fn centers(&self) -> &[Vector3<f64>] {
        &self.centers
    }

    /// Voxel edge length.
    pub fn edge(&self) -> f64 {
        self.edge
    }

    /// Bounding box of all voxels.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Number of voxels.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Total voxel volume in cubic metres.
    pub fn volume(&self) -> f64 {
        self.centers.len() as f64 * self.edge.powi(3)
    }
}

/// The external geometry / voxelization collaborator.
///
/// # Implementations
///
/// - **Reference**: `PrimitiveVoxelizer` - implicit sphere and cylinder
/// - **External**: mesh importers that voxelize arbitrary surfaces
pub trait GeometrySource {
    /// Voxelizes the solid with cubes of the given edge length.
    fn voxelize(&self, edge: f64) -> Result<VoxelSet, EnvError>;

    /// Centre of the solid (used to place the analytical reference).
    fn center(&self) -> Vector3<f64>;
}
