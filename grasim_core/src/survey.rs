//! Survey picks, layouts and sampled measurements.

use crate::error::{PipelineError, Result};
use crate::field::GridField;
use crate::grid::Grid;
use crate::noise::{add_noise, NoiseChannel, NoiseSeeds};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const STAGE: &str = "update_survey";

/// One observation station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurveyPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Append-only list of picked stations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyPointSet {
    points: Vec<SurveyPoint>,
}

impl SurveyPointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a station.
    pub fn push(&mut self, point: SurveyPoint) {
        self.points.push(point);
    }

    /// Adds several stations.
    pub fn extend(&mut self, points: impl IntoIterator<Item = SurveyPoint>) {
        self.points.extend(points);
    }

    /// Forgets every station.
    pub fn reset(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[SurveyPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn zs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.z).collect()
    }
}

/// Measurement variants recorded at the stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyVariant {
    /// Target-only gravity at the true positions
    Target,

    /// Target plus terrain gravity at the true positions
    Full,

    /// Noisy target readings at noisy positions
    Raw,
}

impl SurveyVariant {
    pub fn all() -> [SurveyVariant; 3] {
        [SurveyVariant::Target, SurveyVariant::Full, SurveyVariant::Raw]
    }
}

/// Sampled values and the positions they are attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyMeasurements {
    /// Picked positions
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub zs: Vec<f64>,

    /// GPS-perturbed positions
    pub noisy_xs: Vec<f64>,
    pub noisy_ys: Vec<f64>,

    pub target: Vec<f64>,
    pub full: Vec<f64>,
    pub raw: Vec<f64>,
}

impl SurveyMeasurements {
    /// Values of one variant.
    pub fn values(&self, variant: SurveyVariant) -> &[f64] {
        match variant {
            SurveyVariant::Target => &self.target,
            SurveyVariant::Full => &self.full,
            SurveyVariant::Raw => &self.raw,
        }
    }

    /// Positions a variant is attributed to.
    pub fn locations(&self, variant: SurveyVariant) -> (&[f64], &[f64]) {
        match variant {
            SurveyVariant::Target | SurveyVariant::Full => (&self.xs, &self.ys),
            SurveyVariant::Raw => (&self.noisy_xs, &self.noisy_ys),
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// Samples the perfect fields at every station.
///
/// Stations must sit exactly on grid nodes. Raw readings are the target
/// values with gravimeter noise, attributed to GPS-perturbed positions.
pub fn update_survey(
    points: &SurveyPointSet,
    target: &GridField,
    full: &GridField,
    gravity_error: f64,
    gps_error: f64,
    seeds: NoiseSeeds,
) -> Result<SurveyMeasurements> {
    if target.shape() != full.shape() {
        return Err(PipelineError::shape(STAGE, target.shape(), full.shape()));
    }

    let grid = target.grid();
    let mut target_values = Vec::with_capacity(points.len());
    let mut full_values = Vec::with_capacity(points.len());
    for p in points.points() {
        let (row, col) = grid
            .locate(p.x, p.y)
            .ok_or(PipelineError::PointNotOnGrid { stage: STAGE, x: p.x, y: p.y })?;
        target_values.push(target.get(row, col));
        full_values.push(full.get(row, col));
    }

    let xs = points.xs();
    let ys = points.ys();
    let noisy_xs = add_noise(&xs, gps_error, seeds.channel(NoiseChannel::PositionX))?;
    let noisy_ys = add_noise(&ys, gps_error, seeds.channel(NoiseChannel::PositionY))?;
    let raw = add_noise(&target_values, gravity_error, seeds.channel(NoiseChannel::Reading))?;

    Ok(SurveyMeasurements {
        xs,
        ys,
        zs: points.zs(),
        noisy_xs,
        noisy_ys,
        target: target_values,
        full: full_values,
        raw,
    })
}

/// Station layouts that land exactly on grid nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum SurveyLayout {
    /// Every `stride_x`-th column of every `stride_y`-th row
    Regular { stride_x: usize, stride_y: usize },

    /// Archimedean spiral from the grid centre
    Spiral { turns: f64, points: usize },
}

impl SurveyLayout {
    /// Node coordinates `(x, y)` of the layout on `grid`.
    pub fn stations(&self, grid: &Grid) -> Result<Vec<(f64, f64)>> {
        match *self {
            SurveyLayout::Regular { stride_x, stride_y } => regular(grid, stride_x, stride_y),
            SurveyLayout::Spiral { turns, points } => spiral(grid, turns, points),
        }
    }
}

/// Every n-th grid node, starting at the first.
pub fn regular(grid: &Grid, stride_x: usize, stride_y: usize) -> Result<Vec<(f64, f64)>> {
    if stride_x == 0 || stride_y == 0 {
        return Err(PipelineError::invalid("survey_layout", "strides must be at least 1"));
    }
    let mut stations = Vec::new();
    for &y in grid.y_axis().iter().step_by(stride_y) {
        for &x in grid.x_axis().iter().step_by(stride_x) {
            stations.push((x, y));
        }
    }
    Ok(stations)
}

/// `points` samples along a spiral of `turns` revolutions reaching the
/// nearest grid edge, snapped to nodes with repeats dropped.
pub fn spiral(grid: &Grid, turns: f64, points: usize) -> Result<Vec<(f64, f64)>> {
    if points == 0 || !(turns.is_finite() && turns > 0.0) {
        return Err(PipelineError::invalid(
            "survey_layout",
            format!("spiral needs positive turns and points, got {} and {}", turns, points),
        ));
    }

    let [x_min, y_min, x_max, y_max] = grid.bounds();
    let cx = (x_min + x_max) / 2.0;
    let cy = (y_min + y_max) / 2.0;
    let reach = ((x_max - x_min) / 2.0).min((y_max - y_min) / 2.0);

    let mut seen = Vec::new();
    let mut stations = Vec::new();
    for k in 0..points {
        let t = if points == 1 { 0.0 } else { k as f64 / (points - 1) as f64 };
        let angle = 2.0 * PI * turns * t;
        let radius = reach * t;
        let node = grid.nearest_node(cx + radius * angle.cos(), cy + radius * angle.sin());
        if !seen.contains(&node) {
            seen.push(node);
            stations.push((grid.x_axis()[node.1], grid.y_axis()[node.0]));
        }
    }
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fields() -> (GridField, GridField) {
        let grid = Arc::new(Grid::manual(10.0, 0.0, 0.0, 40.0, 40.0).unwrap());
        let target: Vec<f64> = (0..grid.len()).map(|i| i as f64).collect();
        let full: Vec<f64> = target.iter().map(|v| v + 100.0).collect();
        (
            GridField::new(Arc::clone(&grid), target).unwrap(),
            GridField::new(grid, full).unwrap(),
        )
    }

    fn picks(coords: &[(f64, f64)]) -> SurveyPointSet {
        let mut set = SurveyPointSet::new();
        for &(x, y) in coords {
            set.push(SurveyPoint { x, y, z: 0.0 });
        }
        set
    }

    #[test]
    fn test_samples_exact_nodes() {
        let (target, full) = fields();
        let points = picks(&[(0.0, 0.0), (20.0, 10.0), (40.0, 40.0)]);
        let m = update_survey(&points, &target, &full, 0.0, 0.0, NoiseSeeds::default()).unwrap();

        assert_eq!(m.target, vec![0.0, 7.0, 24.0]);
        assert_eq!(m.full, vec![100.0, 107.0, 124.0]);
        assert_eq!(m.raw, m.target);
        assert_eq!(m.noisy_xs, m.xs);
    }

    #[test]
    fn test_off_grid_pick_fails() {
        let (target, full) = fields();
        let points = picks(&[(0.0, 0.0), (15.0, 10.0)]);
        let result = update_survey(&points, &target, &full, 0.0, 0.0, NoiseSeeds::default());
        assert!(matches!(result, Err(PipelineError::PointNotOnGrid { x, .. }) if x == 15.0));
    }

    #[test]
    fn test_raw_uses_noisy_locations() {
        let (target, full) = fields();
        let points = picks(&[(0.0, 0.0), (20.0, 10.0), (40.0, 40.0), (10.0, 30.0)]);
        let m = update_survey(&points, &target, &full, 0.5, 2.0, NoiseSeeds::new(9)).unwrap();

        assert_ne!(m.noisy_xs, m.xs);
        assert_ne!(m.noisy_xs, m.noisy_ys);
        assert_eq!(m.locations(SurveyVariant::Raw).0, m.noisy_xs.as_slice());
        assert_eq!(m.locations(SurveyVariant::Full).0, m.xs.as_slice());
        assert_ne!(m.values(SurveyVariant::Raw), m.values(SurveyVariant::Target));
    }

    #[test]
    fn test_point_set_is_append_only_until_reset() {
        let mut set = picks(&[(0.0, 0.0)]);
        set.extend([SurveyPoint { x: 10.0, y: 0.0, z: 1.0 }]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.zs(), vec![0.0, 1.0]);
        set.reset();
        assert!(set.is_empty());
    }

    #[test]
    fn test_regular_layout() {
        let grid = Grid::manual(10.0, 0.0, 0.0, 40.0, 40.0).unwrap();
        let stations = regular(&grid, 2, 4).unwrap();
        assert_eq!(stations, vec![(0.0, 0.0), (20.0, 0.0), (40.0, 0.0), (0.0, 40.0), (20.0, 40.0), (40.0, 40.0)]);
        assert!(regular(&grid, 0, 1).is_err());
    }

    #[test]
    fn test_spiral_layout_lands_on_nodes() {
        let grid = Grid::manual(10.0, -100.0, -100.0, 100.0, 100.0).unwrap();
        let stations = spiral(&grid, 3.0, 60).unwrap();

        assert_eq!(stations[0], (0.0, 0.0));
        assert!(stations.len() > 10);
        for &(x, y) in &stations {
            assert!(grid.locate(x, y).is_some());
        }
        let mut unique = stations.clone();
        unique.dedup();
        assert_eq!(unique.len(), stations.len());
    }
}
