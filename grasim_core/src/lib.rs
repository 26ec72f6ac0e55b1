//! GraSim Core - Gravity Forward Modelling and Survey Simulation
//!
//! Models the gravity signal of a buried density anomaly beneath terrain,
//! then simulates how well a noisy field survey recovers it:
//! 1. **Forward model**: closed-form prism, sphere and terrain-column kernels
//! 2. **Survey**: noisy sampling at stations and scattered-data reconstruction
//! 3. **Reduction**: free-air and terrain corrections from the measured DEM
//!
//! Every field lives on one immutable [`Grid`] and is published as a whole
//! into a [`FieldSet`]; [`Session`] sequences the stages and refuses to run
//! one before its inputs exist.

pub mod assembler;
pub mod corrections;
pub mod elevation;
pub mod error;
pub mod field;
pub mod grid;
pub mod interpolate;
pub mod kernels;
pub mod noise;
pub mod params;
pub mod session;
pub mod survey;
pub mod triangulation;
pub mod validation;

// Re-export key types for convenience
pub use assembler::{Background, NoiseOptions, Realisation, TargetGravity};
pub use corrections::{CorrectionFlags, CorrectedFields};
pub use elevation::{TerrainParams, RASTER_METHOD};
pub use error::{PipelineError, Result};
pub use field::{FieldKey, FieldSet, GridField};
pub use grid::{Extent, Grid};
pub use interpolate::{InterpolationMethod, ScatteredInterpolator};
pub use noise::{add_noise, NoiseChannel, NoiseSeeds, DEFAULT_NOISE_SEED};
pub use params::{ParamKey, SimulationParameters};
pub use session::{Session, Target};
pub use survey::{SurveyLayout, SurveyMeasurements, SurveyPoint, SurveyPointSet, SurveyVariant};
pub use validation::{compare_fields, RecoveryMetrics, RecoveryReport};
