//! Field exporter.
//!
//! Writes every published field of a session either as one JSON document
//! or as one CSV matrix per field, keyed by the field's stable label.
//! Undefined nodes (outside the survey hull) become `null` / empty cells.

use crate::error::SimError;
use crate::runner::ScenarioResult;
use grasim_core::{FieldKey, GridField, RecoveryMetrics, Session};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// One field as a row-major matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    pub unit: String,

    /// `rows` vectors of `cols` values, y-major
    pub values: Vec<Vec<Option<f64>>>,
}

impl FieldData {
    pub fn from_field(key: FieldKey, field: &GridField) -> Self {
        let (_, cols) = field.shape();
        let values = field
            .values()
            .chunks(cols.max(1))
            .map(|row| row.iter().map(|v| v.is_finite().then_some(*v)).collect())
            .collect();
        Self {
            unit: key.unit().to_string(),
            values,
        }
    }
}

/// A survey station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationExport {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Complete field export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldExport {
    /// Scenario or config name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Datum spacing (m)
    pub resolution: f64,

    pub rows: usize,
    pub cols: usize,
    pub x_axis: Vec<f64>,
    pub y_axis: Vec<f64>,

    /// Simulation parameters in display order
    pub parameters: Vec<(String, String)>,

    pub stations: Vec<StationExport>,

    /// Published fields by label
    pub fields: BTreeMap<String, FieldData>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metrics: BTreeMap<String, RecoveryMetrics>,
}

impl FieldExport {
    /// Captures the state of a finished session.
    pub fn from_session(session: &Session, result: &ScenarioResult) -> Self {
        let (resolution, rows, cols, x_axis, y_axis) = match session.grid() {
            Some(grid) => (
                grid.resolution(),
                grid.rows(),
                grid.cols(),
                grid.x_axis().to_vec(),
                grid.y_axis().to_vec(),
            ),
            None => (0.0, 0, 0, Vec::new(), Vec::new()),
        };

        let fields = session
            .fields()
            .iter()
            .map(|(key, field)| (key.label().to_string(), FieldData::from_field(key, field)))
            .collect();

        let metrics = result
            .metrics
            .report(&result.name)
            .entries
            .into_iter()
            .collect();

        Self {
            scenario: result.name.clone(),
            seed: result.seed,
            resolution,
            rows,
            cols,
            x_axis,
            y_axis,
            parameters: session
                .params()
                .entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            stations: session
                .survey()
                .points()
                .iter()
                .map(|p| StationExport { x: p.x, y: p.y, z: p.z })
                .collect(),
            fields,
            passed: result.passed,
            metrics,
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Writes the requested exports of a finished run. Stops at the first
/// failure.
pub fn export_session(
    session: &Session,
    result: &ScenarioResult,
    json_path: Option<&str>,
    csv_dir: Option<&Path>,
) -> Result<(), SimError> {
    if let Some(path) = json_path {
        let export = FieldExport::from_session(session, result);
        export.write_to_file(path)?;
        info!("Exported {} fields to {}", export.fields.len(), path);
    }
    if let Some(dir) = csv_dir {
        let paths = write_csv_dir(session, dir)?;
        info!("Wrote {} CSV matrices to {}", paths.len(), dir.display());
    }
    Ok(())
}

/// Writes each published field to `<dir>/<label>.csv`, creating `dir` if
/// needed. Returns the written paths in field order.
pub fn write_csv_dir(session: &Session, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(session.fields().len());
    for (key, field) in session.fields().iter() {
        let path = dir.join(format!("{}.csv", key.label()));
        write_csv(field, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// One matrix row per grid row; NaN cells are left empty.
pub fn write_csv(field: &GridField, path: &Path) -> std::io::Result<()> {
    let (_, cols) = field.shape();
    let mut out = BufWriter::new(File::create(path)?);
    for row in field.values().chunks(cols.max(1)) {
        let line: Vec<String> = row
            .iter()
            .map(|v| if v.is_finite() { v.to_string() } else { String::new() })
            .collect();
        writeln!(out, "{}", line.join(","))?;
    }
    out.flush()
}
