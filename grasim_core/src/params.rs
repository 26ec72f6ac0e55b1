//! Human-readable audit record of a run.
//!
//! Purely informational: stages write here as a side effect, nothing reads
//! these values back into a computation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Recorded parameters, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParamKey {
    XPosition,
    YPosition,
    CalculationResolution,
    VoxelResolution,
    TargetDensityContrast,
    TargetDepth,
    TerrainSeed,
    CorrelationLengthX,
    CorrelationLengthY,
    MaxElevation,
    MinElevation,
    DtmError,
    TerrainDensity,
    GravimeterError,
    GpsError,
}

impl ParamKey {
    pub fn all() -> [ParamKey; 15] {
        [
            ParamKey::XPosition,
            ParamKey::YPosition,
            ParamKey::CalculationResolution,
            ParamKey::VoxelResolution,
            ParamKey::TargetDensityContrast,
            ParamKey::TargetDepth,
            ParamKey::TerrainSeed,
            ParamKey::CorrelationLengthX,
            ParamKey::CorrelationLengthY,
            ParamKey::MaxElevation,
            ParamKey::MinElevation,
            ParamKey::DtmError,
            ParamKey::TerrainDensity,
            ParamKey::GravimeterError,
            ParamKey::GpsError,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParamKey::XPosition => "x position",
            ParamKey::YPosition => "y position",
            ParamKey::CalculationResolution => "Calculation Resolution",
            ParamKey::VoxelResolution => "Voxel Resolution",
            ParamKey::TargetDensityContrast => "Target Density Contrast",
            ParamKey::TargetDepth => "Target Depth",
            ParamKey::TerrainSeed => "Terrain Seed",
            ParamKey::CorrelationLengthX => "Correlation Length, x",
            ParamKey::CorrelationLengthY => "Correlation Length, y",
            ParamKey::MaxElevation => "Max Elevation",
            ParamKey::MinElevation => "Min Elevation",
            ParamKey::DtmError => "DTM Error",
            ParamKey::TerrainDensity => "Background/Terrain Density",
            ParamKey::GravimeterError => "Gravimeter Error",
            ParamKey::GpsError => "GPS Error",
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered parameter record; unset keys are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    values: BTreeMap<ParamKey, String>,
}

impl SimulationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value with its unit, e.g. `set(GpsError, 0.5, "m")`.
    pub fn set(&mut self, key: ParamKey, value: impl fmt::Display, unit: &str) {
        let text = if unit.is_empty() {
            value.to_string()
        } else {
            format!("{} {}", value, unit)
        };
        self.values.insert(key, text);
    }

    pub fn get(&self, key: ParamKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// `(label, value)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        self.values.iter().map(|(k, v)| (k.label(), v.as_str())).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_follow_display_order() {
        let mut params = SimulationParameters::new();
        params.set(ParamKey::GpsError, 0.5, "m");
        params.set(ParamKey::CalculationResolution, 10, "");
        params.set(ParamKey::DtmError, "+/- 2", "m");

        let entries = params.entries();
        assert_eq!(
            entries,
            vec![
                ("Calculation Resolution", "10"),
                ("DTM Error", "+/- 2 m"),
                ("GPS Error", "0.5 m"),
            ]
        );
    }

    #[test]
    fn test_overwrite_and_clear() {
        let mut params = SimulationParameters::new();
        params.set(ParamKey::TerrainSeed, -7, "");
        params.set(ParamKey::TerrainSeed, -8, "");
        assert_eq!(params.get(ParamKey::TerrainSeed), Some("-8"));
        params.clear();
        assert!(params.is_empty());
    }
}
