//! GraSim batch harness
//!
//! Drives the full pipeline of `grasim_core` from a single configuration:
//! build the target and datum, synthesise terrain and its DEM, forward
//! model every gravity field, survey it with instrument noise, reconstruct
//! and correct, then score the reconstructions.
//!
//! # Determinism
//!
//! All entropy derives from one 64-bit master seed ([`SeedPlan`]), so a
//! run is reproduced exactly by its config and seed.
//!
//! # Usage
//!
//! ```ignore
//! use grasim_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::TerrainSphere);
//! assert!(result.passed);
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod runner;
pub mod scenarios;

pub use config::{ExtentConfig, SeedPlan, SimConfig, SurveyConfig, TargetConfig, TerrainConfig};
pub use error::SimError;
pub use exporter::{export_session, write_csv, write_csv_dir, FieldData, FieldExport, StationExport};
pub use runner::{run_config, ScenarioMetrics, ScenarioResult, ScenarioRunner, MIN_COVERAGE};
pub use scenarios::ScenarioId;
