//! Free-air and terrain corrections.

use crate::error::Result;
use crate::field::GridField;
use crate::kernels::FREE_AIR_GRADIENT;
use serde::{Deserialize, Serialize};

/// Which correction terms to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionFlags {
    pub free_air: bool,
    pub terrain: bool,
}

impl CorrectionFlags {
    pub fn new(free_air: bool, terrain: bool) -> Self {
        Self { free_air, terrain }
    }
}

/// Free-air correction from the DEM.
pub fn free_air_correction(dem: &GridField) -> GridField {
    dem.map(|z| FREE_AIR_GRADIENT * z)
}

/// Terrain correction: the DEM terrain signal removed.
pub fn terrain_correction(dem_gravity: &GridField) -> GridField {
    dem_gravity.map(|g| -g)
}

/// Corrected fields produced by one application.
#[derive(Debug, Clone)]
pub struct CorrectedFields {
    /// Noisy full survey plus corrections
    pub full: GridField,

    /// Interpolated full field plus corrections
    pub interpolated: GridField,
}

/// Adds the selected correction terms to the noisy full field and the
/// interpolated full field.
///
/// With no terms selected the inputs come back unchanged. NaN cells of the
/// interpolated field stay NaN.
pub fn apply_corrections(
    noisy_full: &GridField,
    interpolated_full: &GridField,
    free_air: &GridField,
    terrain: &GridField,
    flags: CorrectionFlags,
) -> Result<CorrectedFields> {
    if !flags.free_air && !flags.terrain {
        return Ok(CorrectedFields {
            full: noisy_full.clone(),
            interpolated: interpolated_full.clone(),
        });
    }

    let fa_weight = if flags.free_air { 1.0 } else { 0.0 };
    let tc_weight = if flags.terrain { 1.0 } else { 0.0 };
    let correction = free_air.zip_with(terrain, |fa, tc| fa_weight * fa + tc_weight * tc)?;

    Ok(CorrectedFields {
        full: noisy_full.add(&correction)?,
        interpolated: interpolated_full.add(&correction)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use std::sync::Arc;

    fn field(values: Vec<f64>) -> GridField {
        let grid = Arc::new(Grid::manual(10.0, 0.0, 0.0, 10.0, 10.0).unwrap());
        GridField::new(grid, values).unwrap()
    }

    #[test]
    fn test_no_flags_returns_inputs() {
        let full = field(vec![1.0, 2.0, 3.0, 4.0]);
        let interp = field(vec![f64::NAN, 2.0, 3.0, 4.0]);
        let fa = field(vec![0.5; 4]);
        let tc = field(vec![-0.25; 4]);

        let out = apply_corrections(&full, &interp, &fa, &tc, CorrectionFlags::default()).unwrap();
        assert_eq!(out.full, full);
        assert_eq!(out.interpolated.values()[1..], interp.values()[1..]);
        assert!(out.interpolated.values()[0].is_nan());
    }

    #[test]
    fn test_terms_add_selectively() {
        let full = field(vec![1.0; 4]);
        let interp = field(vec![f64::NAN, 1.0, 1.0, 1.0]);
        let fa = field(vec![0.5; 4]);
        let tc = field(vec![-0.25; 4]);

        let out = apply_corrections(&full, &interp, &fa, &tc, CorrectionFlags::new(true, false)).unwrap();
        assert_eq!(out.full.values(), &[1.5; 4]);

        let out = apply_corrections(&full, &interp, &fa, &tc, CorrectionFlags::new(false, true)).unwrap();
        assert_eq!(out.full.values(), &[0.75; 4]);

        let out = apply_corrections(&full, &interp, &fa, &tc, CorrectionFlags::new(true, true)).unwrap();
        assert_eq!(out.full.values(), &[1.25; 4]);
        assert!(out.interpolated.values()[0].is_nan());
        assert_eq!(out.interpolated.values()[3], 1.25);
    }

    #[test]
    fn test_correction_fields() {
        let dem = field(vec![0.0, 10.0, 100.0, -10.0]);
        let fa = free_air_correction(&dem);
        approx::assert_relative_eq!(fa.values()[2], 3.086, epsilon = 1e-12);

        let gravity = field(vec![0.1, -0.2, 0.0, 0.3]);
        assert_eq!(terrain_correction(&gravity).values(), &[-0.1, 0.2, -0.0, -0.3]);
    }
}
