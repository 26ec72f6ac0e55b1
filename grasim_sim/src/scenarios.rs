//! Canned survey scenarios.

use crate::config::{SimConfig, SurveyConfig, TargetConfig, TerrainConfig};
use grasim_core::{InterpolationMethod, SurveyLayout};
use grasim_env::ImplicitSolid;
use nalgebra::Vector3;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Sphere under a flat datum; terrain terms vanish
    FlatSphere,

    /// Sphere under gently rolling terrain
    TerrainSphere,

    /// Sphere under short-wavelength high-relief terrain with a poor DEM
    RuggedTerrain,

    /// Sparse spiral survey reconstructed with cubic patches
    SparseSurvey,

    /// Horizontal cylinder under exponential terrain, nearest-neighbour
    CylinderTerrain,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FlatSphere,
            ScenarioId::TerrainSphere,
            ScenarioId::RuggedTerrain,
            ScenarioId::SparseSurvey,
            ScenarioId::CylinderTerrain,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FlatSphere => "flat_sphere",
            ScenarioId::TerrainSphere => "terrain_sphere",
            ScenarioId::RuggedTerrain => "rugged_terrain",
            ScenarioId::SparseSurvey => "sparse_survey",
            ScenarioId::CylinderTerrain => "cylinder_terrain",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FlatSphere => "Sphere at 100 m under flat ground, regular grid survey",
            ScenarioId::TerrainSphere => "Sphere at 100 m under 0-50 m Gaussian terrain, 1 m DEM error",
            ScenarioId::RuggedTerrain => "Sphere under 0-150 m terrain with 40 m correlation, 5 m DEM error",
            ScenarioId::SparseSurvey => "40-point spiral survey, cubic reconstruction, 2 m GPS error",
            ScenarioId::CylinderTerrain => "Horizontal cylinder under exponential terrain, nearest-neighbour",
        }
    }

    /// Whether the target is a sphere, so the analytical reference applies.
    pub fn is_spherical(&self) -> bool {
        !matches!(self, ScenarioId::CylinderTerrain)
    }

    /// Full configuration of the scenario for `seed`.
    pub fn config(&self, seed: u64) -> SimConfig {
        let base = SimConfig {
            seed,
            ..SimConfig::default()
        };

        match self {
            ScenarioId::FlatSphere => SimConfig {
                terrain: TerrainConfig {
                    max_elevation: 0.0,
                    min_elevation: 0.0,
                    dem_error: 0.0,
                    ..base.terrain.clone()
                },
                ..base
            },
            ScenarioId::TerrainSphere => base,
            ScenarioId::RuggedTerrain => SimConfig {
                terrain: TerrainConfig {
                    method: 3,
                    x_corr_len: 40.0,
                    y_corr_len: 40.0,
                    max_elevation: 150.0,
                    min_elevation: 0.0,
                    dem_error: 5.0,
                    ..base.terrain.clone()
                },
                ..base
            },
            ScenarioId::SparseSurvey => SimConfig {
                survey: SurveyConfig {
                    layout: SurveyLayout::Spiral { turns: 3.0, points: 40 },
                    gps_error: 2.0,
                    ..base.survey.clone()
                },
                interpolation: InterpolationMethod::Cubic,
                ..base
            },
            ScenarioId::CylinderTerrain => SimConfig {
                target: TargetConfig {
                    solid: ImplicitSolid::Cylinder {
                        center: Vector3::new(0.0, 0.0, -60.0),
                        radius: 20.0,
                        length: 200.0,
                    },
                    ..base.target.clone()
                },
                terrain: TerrainConfig {
                    method: 4,
                    ..base.terrain.clone()
                },
                interpolation: InterpolationMethod::Nearest,
                ..base
            },
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat_sphere" | "flatsphere" | "flat" => Ok(ScenarioId::FlatSphere),
            "terrain_sphere" | "terrainsphere" | "terrain" => Ok(ScenarioId::TerrainSphere),
            "rugged_terrain" | "ruggedterrain" | "rugged" => Ok(ScenarioId::RuggedTerrain),
            "sparse_survey" | "sparsesurvey" | "sparse" => Ok(ScenarioId::SparseSurvey),
            "cylinder_terrain" | "cylinderterrain" | "cylinder" => Ok(ScenarioId::CylinderTerrain),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().unwrap();
            assert_eq!(parsed, scenario);
        }
        assert_eq!("RUGGED".parse::<ScenarioId>(), Ok(ScenarioId::RuggedTerrain));
        assert!("volcano".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_every_config_is_valid() {
        for scenario in ScenarioId::all() {
            let config = scenario.config(9);
            assert_eq!(config.seed, 9);
            assert!(config.validate().is_ok(), "{} invalid", scenario);
        }
    }

    #[test]
    fn test_flat_sphere_has_no_relief() {
        let config = ScenarioId::FlatSphere.config(1);
        assert_eq!(config.terrain.max_elevation, config.terrain.min_elevation);
        assert!(ScenarioId::FlatSphere.is_spherical());
        assert!(!ScenarioId::CylinderTerrain.is_spherical());
    }
}
