//! GraSim Collaborator Boundary
//!
//! This crate holds everything the gravity pipeline consumes from the
//! outside world, specified only at its boundary:
//! - **Terrain**: raw random-field rasters keyed by autocorrelation method
//! - **Rasters**: imported whitespace-delimited `x y z` elevation files
//! - **Geometry**: voxelized target bodies (cell centres + edge length)
//!
//! The core never reaches past these traits, so a real stochastic
//! generator or mesh voxelizer can be swapped in without touching the
//! physics.
//!
//! # Example
//!
//! ```ignore
//! use grasim_env::{CorrelatedFieldGenerator, TerrainGenerator, TerrainRequest};
//!
//! let generator = CorrelatedFieldGenerator::new();
//! let raw = generator.generate(&TerrainRequest {
//!     method: 2,
//!     seed: -42,
//!     x_corr_len: 30.0,
//!     y_corr_len: 60.0,
//!     rows: 64,
//!     cols: 64,
//!     resolution: 10.0,
//! })?;
//! ```

mod correlated;
mod error;
mod geometry;
mod primitives;
mod terrain;
mod types;

pub use correlated::{Autocorrelation, CorrelatedFieldGenerator};
pub use error::EnvError;
pub use geometry::{BoundingBox, GeometrySource, VoxelSet};
pub use primitives::{ImplicitSolid, PrimitiveVoxelizer};
pub use terrain::{RawRaster, TerrainGenerator, TerrainRequest};
pub use types::ElevationRaster;
