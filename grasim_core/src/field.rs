//! Grid-shaped fields and the closed set of field names.

use crate::error::{PipelineError, Result};
use crate::grid::Grid;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const STAGE: &str = "field";

/// A value per grid node, held both raveled and as a rows x cols matrix.
///
/// The two views are built together by the only constructor, so
/// `matrix == values.reshape(rows, cols)` always holds. Fields are
/// immutable; transformations return new fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    grid: Arc<Grid>,
    values: Vec<f64>,
    matrix: DMatrix<f64>,
}

impl GridField {
    /// Creates a field, checking that `values` covers the grid exactly.
    pub fn new(grid: Arc<Grid>, values: Vec<f64>) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(PipelineError::shape(STAGE, grid.shape(), (values.len(), 1)));
        }
        let matrix = DMatrix::from_row_slice(grid.rows(), grid.cols(), &values);
        Ok(Self { grid, values, matrix })
    }

    /// A field of zeros.
    pub fn zeros(grid: Arc<Grid>) -> Self {
        let values = vec![0.0; grid.len()];
        let matrix = DMatrix::zeros(grid.rows(), grid.cols());
        Self { grid, values, matrix }
    }

    /// The grid this field lives on.
    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    /// Raveled x coordinates.
    pub fn xs(&self) -> &[f64] {
        self.grid.xs()
    }

    /// Raveled y coordinates.
    pub fn ys(&self) -> &[f64] {
        self.grid.ys()
    }

    /// Raveled values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values as a rows x cols matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[(row, col)]
    }

    /// Applies `f` to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        let values = self.values.iter().map(|&v| f(v)).collect();
        let matrix = self.matrix.map(&f);
        Self {
            grid: Arc::clone(&self.grid),
            values,
            matrix,
        }
    }

    /// Combines two fields node by node.
    pub fn zip_with(&self, other: &GridField, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.shape() != other.shape() {
            return Err(PipelineError::shape(STAGE, self.shape(), other.shape()));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Self::new(Arc::clone(&self.grid), values)
    }

    /// Node-wise sum.
    pub fn add(&self, other: &GridField) -> Result<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    /// One row of the field (constant y).
    pub fn row_profile(&self, row: usize) -> Result<Vec<f64>> {
        if row >= self.grid.rows() {
            return Err(PipelineError::invalid(
                STAGE,
                format!("row {} out of range for {} rows", row, self.grid.rows()),
            ));
        }
        Ok(self.matrix.row(row).iter().copied().collect())
    }

    /// One column of the field (constant x).
    pub fn column_profile(&self, col: usize) -> Result<Vec<f64>> {
        if col >= self.grid.cols() {
            return Err(PipelineError::invalid(
                STAGE,
                format!("column {} out of range for {} columns", col, self.grid.cols()),
            ));
        }
        Ok(self.matrix.column(col).iter().copied().collect())
    }

    /// Number of finite (non-missing) values.
    pub fn finite_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// `(min, max)` over finite values.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Every named output of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    TrueElevation,
    DemElevation,
    TerrainGravity,
    DemGravity,
    TargetGravity,
    FullGravity,
    AnalyticalGravity,
    NoisyTargetGravity,
    NoisyFullGravity,
    InterpTargetGravity,
    InterpFullGravity,
    InterpRawGravity,
    FreeAirCorrection,
    TerrainCorrection,
    CorrectedFullGravity,
    CorrectedInterpGravity,
}

impl FieldKey {
    /// All keys in export order.
    pub fn all() -> Vec<FieldKey> {
        vec![
            FieldKey::TrueElevation,
            FieldKey::DemElevation,
            FieldKey::TerrainGravity,
            FieldKey::DemGravity,
            FieldKey::TargetGravity,
            FieldKey::FullGravity,
            FieldKey::AnalyticalGravity,
            FieldKey::NoisyTargetGravity,
            FieldKey::NoisyFullGravity,
            FieldKey::InterpTargetGravity,
            FieldKey::InterpFullGravity,
            FieldKey::InterpRawGravity,
            FieldKey::FreeAirCorrection,
            FieldKey::TerrainCorrection,
            FieldKey::CorrectedFullGravity,
            FieldKey::CorrectedInterpGravity,
        ]
    }

    /// Stable export label.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::TrueElevation => "true_elevation",
            FieldKey::DemElevation => "dem_elevation",
            FieldKey::TerrainGravity => "terrain_gravity",
            FieldKey::DemGravity => "dem_gravity",
            FieldKey::TargetGravity => "target_gravity",
            FieldKey::FullGravity => "full_gravity",
            FieldKey::AnalyticalGravity => "analytical_gravity",
            FieldKey::NoisyTargetGravity => "noisy_target_gravity",
            FieldKey::NoisyFullGravity => "noisy_full_gravity",
            FieldKey::InterpTargetGravity => "interp_target_gravity",
            FieldKey::InterpFullGravity => "interp_full_gravity",
            FieldKey::InterpRawGravity => "interp_raw_gravity",
            FieldKey::FreeAirCorrection => "free_air_correction",
            FieldKey::TerrainCorrection => "terrain_correction",
            FieldKey::CorrectedFullGravity => "corrected_full_gravity",
            FieldKey::CorrectedInterpGravity => "corrected_interp_gravity",
        }
    }

    /// Physical unit of the field values.
    pub fn unit(&self) -> &'static str {
        match self {
            FieldKey::TrueElevation | FieldKey::DemElevation => "m",
            _ => "mGal",
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FieldKey::all()
            .into_iter()
            .find(|k| k.label() == s)
            .ok_or_else(|| format!("Unknown field: {}", s))
    }
}

/// The published fields of a session.
///
/// Stages publish whole `Arc`s; a published field is never mutated, only
/// replaced.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: BTreeMap<FieldKey, Arc<GridField>>,
}

impl FieldSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes (or replaces) a field.
    pub fn publish(&mut self, key: FieldKey, field: GridField) -> Arc<GridField> {
        let field = Arc::new(field);
        self.fields.insert(key, Arc::clone(&field));
        field
    }

    /// Looks up a field.
    pub fn get(&self, key: FieldKey) -> Option<&Arc<GridField>> {
        self.fields.get(&key)
    }

    /// Looks up a field a stage depends on.
    pub fn require(&self, stage: &'static str, key: FieldKey) -> Result<Arc<GridField>> {
        self.fields
            .get(&key)
            .cloned()
            .ok_or_else(|| PipelineError::missing(stage, key))
    }

    /// Drops the given fields.
    pub fn invalidate(&mut self, keys: &[FieldKey]) {
        for key in keys {
            self.fields.remove(key);
        }
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Whether a field is published.
    pub fn contains(&self, key: FieldKey) -> bool {
        self.fields.contains_key(&key)
    }

    /// Published fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &Arc<GridField>)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// Number of published fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when nothing is published.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid(rows: usize, cols: usize) -> Arc<Grid> {
        let x = (0..cols).map(|c| c as f64 * 10.0).collect();
        let y = (0..rows).map(|r| r as f64 * 10.0).collect();
        Arc::new(Grid::from_axes(x, y, 10.0).unwrap())
    }

    proptest! {
        #[test]
        fn prop_matrix_is_reshaped_values(rows in 1usize..12, cols in 1usize..12, seed in 0u64..1000) {
            let g = grid(rows, cols);
            let values: Vec<f64> = (0..rows * cols)
                .map(|i| ((i as u64 * 7919 + seed) % 1013) as f64 * 0.25 - 100.0)
                .collect();
            let field = GridField::new(g, values.clone()).unwrap();

            for r in 0..rows {
                for c in 0..cols {
                    prop_assert_eq!(field.get(r, c), values[r * cols + c]);
                }
            }

            let mapped = field.map(|v| v * 2.0);
            for r in 0..rows {
                for c in 0..cols {
                    prop_assert_eq!(mapped.get(r, c), mapped.values()[r * cols + c]);
                }
            }
        }
    }

    #[test]
    fn test_rejects_wrong_length() {
        let result = GridField::new(grid(3, 3), vec![0.0; 8]);
        assert!(matches!(result, Err(PipelineError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zip_rejects_mismatched_grids() {
        let a = GridField::zeros(grid(3, 3));
        let b = GridField::zeros(grid(3, 4));
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_profiles() {
        let field = GridField::new(grid(2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(field.row_profile(1).unwrap(), vec![4.0, 5.0, 6.0]);
        assert_eq!(field.column_profile(2).unwrap(), vec![3.0, 6.0]);
        assert!(field.row_profile(2).is_err());
    }

    #[test]
    fn test_finite_statistics_skip_missing() {
        let field = GridField::new(grid(1, 4), vec![f64::NAN, 2.0, -1.0, f64::NAN]).unwrap();
        assert_eq!(field.finite_count(), 2);
        assert_eq!(field.finite_range(), Some((-1.0, 2.0)));
    }

    #[test]
    fn test_field_key_labels_round_trip() {
        for key in FieldKey::all() {
            assert_eq!(key.label().parse::<FieldKey>().unwrap(), key);
        }
        assert!("perfect_gravity".parse::<FieldKey>().is_err());
    }

    #[test]
    fn test_field_set_replaces_wholesale() {
        let g = grid(2, 2);
        let mut set = FieldSet::new();
        let first = set.publish(FieldKey::TargetGravity, GridField::zeros(Arc::clone(&g)));
        let second = set.publish(
            FieldKey::TargetGravity,
            GridField::new(g, vec![1.0; 4]).unwrap(),
        );

        // The earlier Arc still sees its original values
        assert_eq!(first.values(), &[0.0; 4]);
        assert_eq!(second.values(), &[1.0; 4]);
        assert_eq!(set.len(), 1);

        assert!(set.require("test", FieldKey::FullGravity).is_err());
    }
}
