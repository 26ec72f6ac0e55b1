//! Session - the stage sequencer.
//!
//! A `Session` owns the datum and every published field. Each stage method
//! checks that its upstream outputs exist, computes new fields, publishes
//! them wholesale and drops whatever they make stale. Nothing is computed
//! lazily: stages run exactly when called.

use crate::assembler::{self, Background, NoiseOptions};
use crate::corrections::{self, CorrectionFlags};
use crate::elevation::{self, TerrainParams, RASTER_METHOD};
use crate::error::{PipelineError, Result};
use crate::field::{FieldKey, FieldSet, GridField};
use crate::grid::{Extent, Grid};
use crate::interpolate::{self, InterpolationMethod};
use crate::noise::NoiseSeeds;
use crate::params::{ParamKey, SimulationParameters};
use crate::survey::{self, SurveyLayout, SurveyMeasurements, SurveyPoint, SurveyPointSet, SurveyVariant};
use grasim_env::{GeometrySource, TerrainGenerator, VoxelSet};
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, info};

/// Fields that depend on the target geometry.
const TARGET_DEPENDENTS: &[FieldKey] = &[
    FieldKey::TargetGravity,
    FieldKey::FullGravity,
    FieldKey::AnalyticalGravity,
    FieldKey::NoisyTargetGravity,
    FieldKey::NoisyFullGravity,
];

/// Fields that depend on the true terrain.
const TERRAIN_DEPENDENTS: &[FieldKey] = &[
    FieldKey::DemElevation,
    FieldKey::TerrainGravity,
    FieldKey::DemGravity,
    FieldKey::FullGravity,
    FieldKey::NoisyFullGravity,
    FieldKey::FreeAirCorrection,
    FieldKey::TerrainCorrection,
];

/// Fields that depend on the survey measurements.
const SURVEY_DEPENDENTS: &[FieldKey] = &[
    FieldKey::InterpTargetGravity,
    FieldKey::InterpFullGravity,
    FieldKey::InterpRawGravity,
    FieldKey::CorrectedFullGravity,
    FieldKey::CorrectedInterpGravity,
];

/// Fields produced by the correction stage.
const CORRECTED: &[FieldKey] = &[FieldKey::CorrectedFullGravity, FieldKey::CorrectedInterpGravity];

/// The buried body being modelled.
#[derive(Debug, Clone)]
pub struct Target {
    /// Voxelized body
    pub voxels: VoxelSet,

    /// Reference centre (used for the analytical sphere)
    pub center: Vector3<f64>,
}

/// Stage sequencer holding one simulation's state.
#[derive(Debug, Default)]
pub struct Session {
    grid: Option<Arc<Grid>>,
    raster_elevations: Option<Vec<f64>>,
    target: Option<Target>,
    fields: FieldSet,
    survey: SurveyPointSet,
    measurements: Option<SurveyMeasurements>,
    params: SimulationParameters,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn grid(&self) -> Option<&Arc<Grid>> {
        self.grid.as_ref()
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// A published field, if present.
    pub fn field(&self, key: FieldKey) -> Option<&Arc<GridField>> {
        self.fields.get(key)
    }

    pub fn survey(&self) -> &SurveyPointSet {
        &self.survey
    }

    pub fn measurements(&self) -> Option<&SurveyMeasurements> {
        self.measurements.as_ref()
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Slice of a field along one grid row (constant y).
    pub fn row_profile(&self, key: FieldKey, row: usize) -> Result<Vec<f64>> {
        self.fields.require("profile", key)?.row_profile(row)
    }

    /// Slice of a field along one grid column (constant x).
    pub fn column_profile(&self, key: FieldKey, col: usize) -> Result<Vec<f64>> {
        self.fields.require("profile", key)?.column_profile(col)
    }

    fn require_grid(&self, stage: &'static str) -> Result<Arc<Grid>> {
        self.grid
            .as_ref()
            .cloned()
            .ok_or_else(|| PipelineError::missing(stage, "datum"))
    }

    fn require_target(&self, stage: &'static str) -> Result<&Target> {
        self.target
            .as_ref()
            .ok_or_else(|| PipelineError::missing(stage, "target geometry"))
    }

    fn drop_survey_results(&mut self) {
        self.measurements = None;
        self.fields.invalidate(SURVEY_DEPENDENTS);
    }

    // =========================================================================
    // Geometry and datum
    // =========================================================================

    /// Voxelizes the target through a geometry collaborator.
    pub fn load_target(&mut self, source: &dyn GeometrySource, edge: f64) -> Result<&Target> {
        const STAGE: &str = "load_target";

        let voxels = source.voxelize(edge).map_err(|e| PipelineError::generator(STAGE, e))?;
        info!("Voxelized target: {} voxels of {} m", voxels.len(), edge);
        self.set_target(voxels, source.center())
    }

    /// Installs an externally voxelized target.
    pub fn set_target(&mut self, voxels: VoxelSet, center: Vector3<f64>) -> Result<&Target> {
        if voxels.is_empty() {
            return Err(PipelineError::invalid("load_target", "target has no voxels"));
        }

        self.params.set(ParamKey::XPosition, center.x, "m");
        self.params.set(ParamKey::YPosition, center.y, "m");
        self.params.set(ParamKey::TargetDepth, center.z, "m");
        self.params.set(ParamKey::VoxelResolution, voxels.edge(), "m");

        self.fields.invalidate(TARGET_DEPENDENTS);
        self.drop_survey_results();
        Ok(self.target.insert(Target { voxels, center }))
    }

    /// Creates the datum. Replaces the grid and drops every field and the
    /// survey.
    pub fn create_datum(&mut self, resolution: f64, extent: &Extent) -> Result<Arc<Grid>> {
        const STAGE: &str = "create_datum";

        let (grid, raster_elevations) = match extent {
            Extent::Raster {
                raster,
                raster_resolution,
            } => {
                let (grid, elevations) = Grid::from_raster(resolution, raster, *raster_resolution)?;
                (grid, Some(elevations))
            }
            other => {
                let bounds = self.target.as_ref().map(|t| t.voxels.bounds());
                (Grid::create(resolution, other, bounds.as_ref())?, None)
            }
        };

        let grid = Arc::new(grid);
        info!(
            "Datum created: {}x{} nodes at {} m, bounds {:?}",
            grid.rows(),
            grid.cols(),
            resolution,
            grid.bounds()
        );
        debug!("[{}] raster elevations: {}", STAGE, raster_elevations.is_some());

        self.fields.clear();
        self.survey.reset();
        self.measurements = None;
        self.raster_elevations = raster_elevations;
        self.params.set(ParamKey::CalculationResolution, resolution, "");
        self.grid = Some(Arc::clone(&grid));
        Ok(grid)
    }

    // =========================================================================
    // Terrain
    // =========================================================================

    /// Builds the true terrain; method 6 uses the raster imported with the
    /// datum.
    pub fn generate_terrain(
        &mut self,
        generator: &dyn TerrainGenerator,
        params: &TerrainParams,
    ) -> Result<Arc<GridField>> {
        const STAGE: &str = "generate_terrain";

        let grid = self.require_grid(STAGE)?;
        let terrain = if params.method == RASTER_METHOD {
            let elevations = self
                .raster_elevations
                .as_ref()
                .ok_or_else(|| PipelineError::missing(STAGE, "imported raster"))?;
            elevation::raster_terrain(&grid, elevations)?
        } else {
            elevation::generate_terrain(&grid, generator, params)?
        };

        if let Some((lo, hi)) = terrain.finite_range() {
            info!("Terrain generated (method {}): {:.2}..{:.2} m", params.method, lo, hi);
        }

        self.params.set(ParamKey::TerrainSeed, params.seed, "");
        self.params.set(ParamKey::CorrelationLengthX, params.x_corr_len, "m");
        self.params.set(ParamKey::CorrelationLengthY, params.y_corr_len, "m");
        self.params.set(ParamKey::MaxElevation, params.max_elevation, "m");
        self.params.set(ParamKey::MinElevation, params.min_elevation, "m");

        self.fields.invalidate(TERRAIN_DEPENDENTS);
        self.drop_survey_results();
        Ok(self.fields.publish(FieldKey::TrueElevation, terrain))
    }

    /// Derives the DEM and its free-air correction from the true terrain.
    pub fn generate_dem(&mut self, error_bound: f64, seed: u64) -> Result<Arc<GridField>> {
        const STAGE: &str = "generate_dem";

        let terrain = self.fields.require(STAGE, FieldKey::TrueElevation)?;
        let dem = elevation::generate_dem(&terrain, error_bound, seed)?;
        let free_air = corrections::free_air_correction(&dem);
        info!("DEM generated: +/- {} m error (seed={})", error_bound, seed);

        self.params.set(ParamKey::DtmError, format!("+/- {}", error_bound), "m");
        self.fields
            .invalidate(&[FieldKey::DemGravity, FieldKey::TerrainCorrection]);
        self.fields.invalidate(CORRECTED);
        self.fields.publish(FieldKey::FreeAirCorrection, free_air);
        Ok(self.fields.publish(FieldKey::DemElevation, dem))
    }

    /// Terrain gravity of both surfaces plus the terrain correction.
    pub fn compute_terrain_gravity(&mut self, density: f64) -> Result<Arc<GridField>> {
        const STAGE: &str = "compute_terrain_gravity";

        let terrain = self.fields.require(STAGE, FieldKey::TrueElevation)?;
        let dem = self.fields.require(STAGE, FieldKey::DemElevation)?;

        info!("Computing terrain gravity over {} nodes (density={})", terrain.values().len(), density);
        let terrain_gravity = assembler::compute_terrain_gravity(&terrain, density)?;
        let dem_gravity = assembler::compute_terrain_gravity(&dem, density)?;
        let correction = corrections::terrain_correction(&dem_gravity);
        if let Some((lo, hi)) = terrain_gravity.finite_range() {
            debug!("[{}] terrain signal {:.4}..{:.4} mGal", STAGE, lo, hi);
        }

        self.params.set(ParamKey::TerrainDensity, density, "kg/m^3");
        self.fields
            .invalidate(&[FieldKey::FullGravity, FieldKey::NoisyFullGravity]);
        self.drop_survey_results();
        self.fields.publish(FieldKey::DemGravity, dem_gravity);
        self.fields.publish(FieldKey::TerrainCorrection, correction);
        Ok(self.fields.publish(FieldKey::TerrainGravity, terrain_gravity))
    }

    // =========================================================================
    // Target gravity
    // =========================================================================

    /// Analytical sphere reference centred on the target.
    pub fn compute_analytical_sphere(&mut self, density: f64, radius: f64) -> Result<Arc<GridField>> {
        const STAGE: &str = "compute_analytical_sphere";

        let grid = self.require_grid(STAGE)?;
        let center = self.require_target(STAGE)?.center;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PipelineError::invalid(STAGE, format!("radius must be positive, got {}", radius)));
        }
        let field = assembler::compute_analytical_sphere(&grid, density, radius, &center)?;
        debug!("[{}] radius={} centre={:?}", STAGE, radius, center);
        Ok(self.fields.publish(FieldKey::AnalyticalGravity, field))
    }

    /// Target voxel gravity, flat or over terrain, optionally with a
    /// noisy realisation. Returns the clean field.
    pub fn compute_target_gravity(
        &mut self,
        density: f64,
        with_terrain: bool,
        noise: Option<NoiseOptions>,
    ) -> Result<Arc<GridField>> {
        const STAGE: &str = "compute_target_gravity";

        let grid = self.require_grid(STAGE)?;
        let target = self.require_target(STAGE)?;

        let (clean_key, noisy_key) = if with_terrain {
            (FieldKey::FullGravity, FieldKey::NoisyFullGravity)
        } else {
            (FieldKey::TargetGravity, FieldKey::NoisyTargetGravity)
        };

        info!(
            "Computing {} from {} voxels over {} nodes",
            clean_key,
            target.voxels.len(),
            grid.len()
        );

        let result = if with_terrain {
            let elevation = self.fields.require(STAGE, FieldKey::TrueElevation)?;
            let gravity = self.fields.require(STAGE, FieldKey::TerrainGravity)?;
            assembler::compute_target_gravity(
                &grid,
                &target.voxels,
                density,
                Background::Terrain {
                    elevation: &elevation,
                    gravity: &gravity,
                },
                noise.as_ref(),
            )?
        } else {
            assembler::compute_target_gravity(&grid, &target.voxels, density, Background::Flat, noise.as_ref())?
        };

        self.params.set(ParamKey::TargetDensityContrast, density, "kg/m^3");
        if let Some(options) = &noise {
            self.params.set(ParamKey::GravimeterError, options.gravity_error, "mGal");
            self.params.set(ParamKey::GpsError, options.gps_error, "m");
        }

        self.drop_survey_results();
        match result.noisy {
            Some(noisy) => {
                self.fields.publish(noisy_key, noisy);
            }
            None => self.fields.invalidate(&[noisy_key]),
        }
        Ok(self.fields.publish(clean_key, result.clean))
    }

    // =========================================================================
    // Survey
    // =========================================================================

    /// Adds a station. Its height is read from the true terrain when the
    /// pick sits on a node of an existing surface. Measurements and
    /// reconstructions taken before the pick are dropped.
    pub fn pick(&mut self, x: f64, y: f64) {
        let z = match (&self.grid, self.fields.get(FieldKey::TrueElevation)) {
            (Some(grid), Some(terrain)) => grid
                .locate(x, y)
                .map(|(row, col)| terrain.get(row, col))
                .unwrap_or(0.0),
            _ => 0.0,
        };
        self.survey.push(SurveyPoint { x, y, z });
        self.drop_survey_results();
    }

    /// Picks every station of a layout.
    pub fn pick_layout(&mut self, layout: &SurveyLayout) -> Result<usize> {
        let grid = self.require_grid("survey_layout")?;
        let stations = layout.stations(&grid)?;
        for &(x, y) in &stations {
            self.pick(x, y);
        }
        debug!("Picked {} stations from {:?}", stations.len(), layout);
        Ok(stations.len())
    }

    /// Forgets all stations and their measurements.
    pub fn reset_survey(&mut self) {
        self.survey.reset();
        self.drop_survey_results();
    }

    /// Samples the perfect target and full fields at every station.
    pub fn update_survey(&mut self, gravity_error: f64, gps_error: f64, seeds: NoiseSeeds) -> Result<&SurveyMeasurements> {
        const STAGE: &str = "update_survey";

        let target = self.fields.require(STAGE, FieldKey::TargetGravity)?;
        let full = self.fields.require(STAGE, FieldKey::FullGravity)?;
        let measurements = survey::update_survey(&self.survey, &target, &full, gravity_error, gps_error, seeds)?;
        info!("Survey updated: {} stations", measurements.len());

        self.params.set(ParamKey::GravimeterError, gravity_error, "mGal");
        self.params.set(ParamKey::GpsError, gps_error, "m");
        self.drop_survey_results();
        Ok(self.measurements.insert(measurements))
    }

    /// Reconstructs every survey variant onto the datum.
    pub fn interpolate(&mut self, method: InterpolationMethod) -> Result<()> {
        const STAGE: &str = "interpolate";

        let grid = self.require_grid(STAGE)?;
        let measurements = self
            .measurements
            .as_ref()
            .ok_or_else(|| PipelineError::missing(STAGE, "survey measurements"))?;

        let mut results = Vec::with_capacity(3);
        for variant in SurveyVariant::all() {
            let (xs, ys) = measurements.locations(variant);
            let field = interpolate::interpolate(&grid, xs, ys, measurements.values(variant), method)?;
            debug!(
                "[{}] {:?}: {}/{} nodes defined",
                STAGE,
                variant,
                field.finite_count(),
                grid.len()
            );
            results.push((variant, field));
        }
        info!("Interpolated {} stations ({})", measurements.len(), method);

        self.fields.invalidate(CORRECTED);
        for (variant, field) in results {
            let key = match variant {
                SurveyVariant::Target => FieldKey::InterpTargetGravity,
                SurveyVariant::Full => FieldKey::InterpFullGravity,
                SurveyVariant::Raw => FieldKey::InterpRawGravity,
            };
            self.fields.publish(key, field);
        }
        Ok(())
    }

    // =========================================================================
    // Corrections
    // =========================================================================

    /// Corrects the noisy full field and the interpolated full field.
    pub fn apply_corrections(&mut self, flags: CorrectionFlags) -> Result<()> {
        const STAGE: &str = "apply_corrections";

        let noisy_full = self.fields.require(STAGE, FieldKey::NoisyFullGravity)?;
        let interp_full = self.fields.require(STAGE, FieldKey::InterpFullGravity)?;
        let zeros = || GridField::zeros(Arc::clone(noisy_full.grid()));

        let free_air = if flags.free_air {
            (*self.fields.require(STAGE, FieldKey::FreeAirCorrection)?).clone()
        } else {
            zeros()
        };
        let terrain = if flags.terrain {
            (*self.fields.require(STAGE, FieldKey::TerrainCorrection)?).clone()
        } else {
            zeros()
        };

        let corrected = corrections::apply_corrections(&noisy_full, &interp_full, &free_air, &terrain, flags)?;
        info!(
            "Corrections applied (free_air={}, terrain={})",
            flags.free_air, flags.terrain
        );

        self.fields.publish(FieldKey::CorrectedFullGravity, corrected.full);
        self.fields.publish(FieldKey::CorrectedInterpGravity, corrected.interpolated);
        Ok(())
    }
}
