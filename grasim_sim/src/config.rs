//! Run configuration.
//!
//! A `SimConfig` describes one complete simulation: datum, target, terrain,
//! survey and reduction. It round-trips through JSON so runs can be stored
//! and replayed; every random input is derived from the single `seed`
//! unless the terrain seed is pinned explicitly.

use crate::error::SimError;
use grasim_core::{CorrectionFlags, Extent, InterpolationMethod, NoiseSeeds, SurveyLayout, TerrainParams};
use grasim_env::{ElevationRaster, ImplicitSolid};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Datum extent as written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtentConfig {
    /// Target bounds times a multiplier
    Auto { multiplier: f64 },

    /// Explicit rectangle
    Manual { x1: f64, y1: f64, x2: f64, y2: f64 },

    /// Imported `x y z` raster
    Raster { path: PathBuf, raster_resolution: f64 },
}

impl ExtentConfig {
    /// Resolves to a pipeline extent, reading the raster file if needed.
    pub fn to_extent(&self) -> Result<Extent, SimError> {
        Ok(match self {
            ExtentConfig::Auto { multiplier } => Extent::Auto { multiplier: *multiplier },
            ExtentConfig::Manual { x1, y1, x2, y2 } => Extent::Manual {
                x1: *x1,
                y1: *y1,
                x2: *x2,
                y2: *y2,
            },
            ExtentConfig::Raster { path, raster_resolution } => Extent::Raster {
                raster: ElevationRaster::from_path(path)?,
                raster_resolution: *raster_resolution,
            },
        })
    }
}

/// The buried body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Implicit solid to voxelize
    pub solid: ImplicitSolid,

    /// Voxel edge length (m)
    pub voxel_edge: f64,

    /// Density contrast against the host (kg/m^3)
    pub density_contrast: f64,
}

/// Terrain synthesis and the measured DEM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Autocorrelation method 1..=5, or 6 for the raster datum
    pub method: u8,
    pub x_corr_len: f64,
    pub y_corr_len: f64,
    pub max_elevation: f64,
    pub min_elevation: f64,

    /// Terrain (background) density (kg/m^3)
    pub density: f64,

    /// DEM error bound (m)
    pub dem_error: f64,

    /// Explicit generator seed; derived from the master seed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Station layout and instrument error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyConfig {
    pub layout: SurveyLayout,

    /// Gravimeter error bound (mGal)
    pub gravity_error: f64,

    /// GPS error bound (m)
    pub gps_error: f64,
}

/// One complete simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Datum spacing (m)
    pub resolution: f64,

    pub extent: ExtentConfig,
    pub target: TargetConfig,
    pub terrain: TerrainConfig,
    pub survey: SurveyConfig,
    pub interpolation: InterpolationMethod,
    pub corrections: CorrectionFlags,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            resolution: 10.0,
            extent: ExtentConfig::Manual {
                x1: -200.0,
                y1: -200.0,
                x2: 200.0,
                y2: 200.0,
            },
            target: TargetConfig {
                solid: ImplicitSolid::Sphere {
                    center: Vector3::new(0.0, 0.0, -100.0),
                    radius: 50.0,
                },
                voxel_edge: 10.0,
                density_contrast: 1000.0,
            },
            terrain: TerrainConfig {
                method: 1,
                x_corr_len: 100.0,
                y_corr_len: 100.0,
                max_elevation: 50.0,
                min_elevation: 0.0,
                density: 2670.0,
                dem_error: 1.0,
                seed: None,
            },
            survey: SurveyConfig {
                layout: SurveyLayout::Regular { stride_x: 4, stride_y: 4 },
                gravity_error: 0.03,
                gps_error: 0.5,
            },
            interpolation: InterpolationMethod::Linear,
            corrections: CorrectionFlags::new(true, true),
        }
    }
}

impl SimConfig {
    /// Loads a config from a JSON file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency the pipeline cannot see.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(SimError::config(format!("resolution must be positive, got {}", self.resolution)));
        }
        if self.target.voxel_edge <= 0.0 {
            return Err(SimError::config("voxel_edge must be positive"));
        }
        if self.terrain.method == grasim_core::RASTER_METHOD && !matches!(self.extent, ExtentConfig::Raster { .. }) {
            return Err(SimError::config("terrain method 6 needs a raster extent"));
        }
        if self.survey.gravity_error < 0.0 || self.survey.gps_error < 0.0 || self.terrain.dem_error < 0.0 {
            return Err(SimError::config("error budgets must be non-negative"));
        }
        Ok(())
    }

    /// Seeds for every random input of this run.
    pub fn seeds(&self) -> SeedPlan {
        SeedPlan::new(self.seed)
    }

    /// Terrain parameters with the derived terrain seed.
    pub fn terrain_params(&self) -> TerrainParams {
        TerrainParams {
            method: self.terrain.method,
            x_corr_len: self.terrain.x_corr_len,
            y_corr_len: self.terrain.y_corr_len,
            max_elevation: self.terrain.max_elevation,
            min_elevation: self.terrain.min_elevation,
            seed: self.terrain.seed.unwrap_or_else(|| self.seeds().terrain()),
        }
    }
}

/// Independent seeds derived from one master seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPlan {
    master: u64,
}

impl SeedPlan {
    pub fn new(master: u64) -> Self {
        Self { master }
    }

    pub fn master(&self) -> u64 {
        self.master
    }

    /// Terrain generator seed, negative by convention.
    pub fn terrain(&self) -> i64 {
        let mixed = self.master.wrapping_add(4).wrapping_mul(0x9e3779b97f4a7c15);
        -((mixed >> 33) as i64) - 1
    }

    /// DEM error field seed.
    pub fn dem(&self) -> u64 {
        self.master.wrapping_add(5).wrapping_mul(0x517cc1b727220a95)
    }

    /// Instrument noise channels.
    pub fn noise(&self) -> NoiseSeeds {
        NoiseSeeds::new(self.master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_terrain_seed_is_negative(master in any::<u64>()) {
            prop_assert!(SeedPlan::new(master).terrain() < 0);
        }

        #[test]
        fn prop_seed_plan_is_deterministic(master in any::<u64>()) {
            let a = SeedPlan::new(master);
            let b = SeedPlan::new(master);
            prop_assert_eq!(a.terrain(), b.terrain());
            prop_assert_eq!(a.dem(), b.dem());
        }
    }

    #[test]
    fn test_seed_plan_streams_do_not_overlap() {
        use grasim_core::NoiseChannel;

        for master in [0, 1, 42] {
            let plan = SeedPlan::new(master);
            let noise = plan.noise();
            let dem = plan.dem();
            for channel in [NoiseChannel::PositionX, NoiseChannel::PositionY, NoiseChannel::Reading] {
                assert_ne!(dem, noise.channel(channel), "master {}", master);
            }
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_with_defaults() {
        let json = r#"{
            "seed": 7,
            "resolution": 20.0,
            "interpolation": "cubic",
            "survey": {
                "layout": { "layout": "spiral", "turns": 2.0, "points": 30 },
                "gravity_error": 0.05,
                "gps_error": 1.0
            }
        }"#;
        let config: SimConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.interpolation, InterpolationMethod::Cubic);
        assert_eq!(config.survey.layout, SurveyLayout::Spiral { turns: 2.0, points: 30 });
        assert_eq!(config.terrain, SimConfig::default().terrain);

        let text = serde_json::to_string(&config).unwrap();
        let back: SimConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_raster_method_needs_raster_extent() {
        let mut config = SimConfig::default();
        config.terrain.method = 6;
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_raster_extent_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dem.xyz");
        let mut text = String::new();
        for j in 0..3 {
            for i in 0..3 {
                text.push_str(&format!("{} {} {}\n", i * 10, j * 10, i + j));
            }
        }
        std::fs::write(&path, text).unwrap();

        let extent = ExtentConfig::Raster {
            path,
            raster_resolution: 10.0,
        };
        assert!(matches!(extent.to_extent().unwrap(), Extent::Raster { .. }));

        let missing = ExtentConfig::Raster {
            path: dir.path().join("absent.xyz"),
            raster_resolution: 10.0,
        };
        assert!(matches!(missing.to_extent(), Err(SimError::Env(_))));
    }

    #[test]
    fn test_terrain_params_use_derived_seed() {
        let config = SimConfig::default();
        let params = config.terrain_params();
        assert_eq!(params.seed, SeedPlan::new(42).terrain());
        assert_eq!(params.method, 1);

        let pinned = SimConfig {
            terrain: TerrainConfig {
                seed: Some(-7),
                ..config.terrain.clone()
            },
            ..config
        };
        assert_eq!(pinned.terrain_params().seed, -7);
    }
}
