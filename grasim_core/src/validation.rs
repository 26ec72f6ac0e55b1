//! Validation Module - Recovery of the Perfect Signal
//! ===================================================
//!
//! Compares a reconstructed field (interpolated, corrected) against its
//! perfect counterpart to quantify how accurately a survey recovers the
//! target signal.
//!
//! Key metrics:
//! - Error (RMSE, mean absolute, max absolute, bias)
//! - Coverage (share of nodes where the estimate is defined)
//!
//! Usage:
//! ```ignore
//! use grasim_core::validation::{compare_fields, RecoveryReport};
//!
//! let metrics = compare_fields(&interpolated, &perfect)?;
//! let mut report = RecoveryReport::new("terrain_sphere");
//! report.record("interp_target_gravity", metrics);
//! report.print();
//! ```

use crate::error::{PipelineError, Result};
use crate::field::GridField;
use serde::{Deserialize, Serialize};

// =============================================================================
// RECOVERY METRICS
// =============================================================================

/// Error statistics of one estimate against one reference.
///
/// Only nodes where both fields are finite contribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMetrics {
    /// Nodes compared
    pub compared: usize,
    /// Total nodes in the grid
    pub total: usize,
    /// Sum of squared errors
    pub error_sum_squared: f64,
    /// Sum of absolute errors
    pub error_sum_abs: f64,
    /// Sum of signed errors (estimate - reference)
    pub error_sum: f64,
    /// Largest absolute error
    pub max_abs_error: f64,
}

impl RecoveryMetrics {
    /// Adds one node pair.
    pub fn record(&mut self, estimate: f64, reference: f64) {
        self.total += 1;
        if !(estimate.is_finite() && reference.is_finite()) {
            return;
        }
        let error = estimate - reference;
        self.compared += 1;
        self.error_sum += error;
        self.error_sum_abs += error.abs();
        self.error_sum_squared += error * error;
        self.max_abs_error = self.max_abs_error.max(error.abs());
    }

    /// Root mean square error
    pub fn rmse(&self) -> f64 {
        if self.compared > 0 {
            (self.error_sum_squared / self.compared as f64).sqrt()
        } else {
            0.0
        }
    }

    /// Mean absolute error
    pub fn mae(&self) -> f64 {
        if self.compared > 0 {
            self.error_sum_abs / self.compared as f64
        } else {
            0.0
        }
    }

    /// Mean signed error
    pub fn bias(&self) -> f64 {
        if self.compared > 0 {
            self.error_sum / self.compared as f64
        } else {
            0.0
        }
    }

    /// Fraction of nodes compared (0..=1)
    pub fn coverage(&self) -> f64 {
        if self.total > 0 {
            self.compared as f64 / self.total as f64
        } else {
            0.0
        }
    }

    /// Check against acceptance thresholds
    pub fn passes(&self, max_rmse: f64, min_coverage: f64) -> bool {
        self.compared > 0 && self.rmse() <= max_rmse && self.coverage() >= min_coverage
    }
}

/// Compares `estimate` to `reference` node by node.
pub fn compare_fields(estimate: &GridField, reference: &GridField) -> Result<RecoveryMetrics> {
    if estimate.shape() != reference.shape() {
        return Err(PipelineError::shape("compare_fields", reference.shape(), estimate.shape()));
    }

    let mut metrics = RecoveryMetrics::default();
    for (&e, &r) in estimate.values().iter().zip(reference.values()) {
        metrics.record(e, r);
    }
    Ok(metrics)
}

// =============================================================================
// RECOVERY REPORT
// =============================================================================

/// Labelled comparisons for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub name: String,
    pub entries: Vec<(String, RecoveryMetrics)>,
}

impl RecoveryReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Adds a comparison under `label`.
    pub fn record(&mut self, label: impl Into<String>, metrics: RecoveryMetrics) {
        self.entries.push((label.into(), metrics));
    }

    /// Looks up a comparison by label.
    pub fn get(&self, label: &str) -> Option<&RecoveryMetrics> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, m)| m)
    }

    /// Print formatted report to console
    pub fn print(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║ RECOVERY REPORT: {:<44}║", self.name);
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Field                      RMSE      MaxAbs    Bias   Cover  ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        for (label, m) in &self.entries {
            println!(
                "║ {:<24} {:>8.4}  {:>8.4} {:>8.4} {:>5.1}%  ║",
                label,
                m.rmse(),
                m.max_abs_error,
                m.bias(),
                m.coverage() * 100.0
            );
        }
        println!("╚══════════════════════════════════════════════════════════════╝");
    }
}

// =============================================================================
// TESTS
// =============================================================================
