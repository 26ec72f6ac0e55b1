//! Scattered-data interpolation of survey stations back onto the datum.
//!
//! `linear` and `cubic` are defined inside the convex hull of the stations
//! and leave NaN outside it; `nearest` fills every node.

use crate::error::{PipelineError, Result};
use crate::field::GridField;
use crate::grid::Grid;
use crate::triangulation::Triangulation;
use nalgebra::{Matrix2, Point2, Vector2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const STAGE: &str = "interpolate";

/// Minimum stations for any method.
pub const MIN_POINTS: usize = 3;

/// Interpolation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Piecewise-planar over the Delaunay triangles
    Linear,

    /// Cubic Bézier patch per triangle, C1 at the vertices
    Cubic,

    /// Value of the closest station
    Nearest,
}

impl InterpolationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Cubic => "cubic",
            Self::Nearest => "nearest",
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for InterpolationMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "cubic" => Ok(Self::Cubic),
            "nearest" => Ok(Self::Nearest),
            _ => Err(format!("Unknown interpolation method: {}. Use linear, cubic or nearest", s)),
        }
    }
}

/// Interpolant built once from the stations and evaluated anywhere.
#[derive(Debug, Clone)]
pub struct ScatteredInterpolator {
    method: InterpolationMethod,
    points: Vec<Point2<f64>>,
    values: Vec<f64>,
    triangulation: Option<Triangulation>,
    gradients: Vec<Vector2<f64>>,
}

impl ScatteredInterpolator {
    /// Builds the interpolant. Repeated positions keep their first value.
    pub fn new(xs: &[f64], ys: &[f64], values: &[f64], method: InterpolationMethod) -> Result<Self> {
        if xs.len() != ys.len() || xs.len() != values.len() {
            return Err(PipelineError::invalid(
                STAGE,
                format!("{} x, {} y and {} values given", xs.len(), ys.len(), values.len()),
            ));
        }
        if xs.len() < MIN_POINTS {
            return Err(PipelineError::InsufficientPoints {
                stage: STAGE,
                found: xs.len(),
                required: MIN_POINTS,
            });
        }

        let mut points: Vec<Point2<f64>> = Vec::with_capacity(xs.len());
        let mut unique_values = Vec::with_capacity(xs.len());
        for ((&x, &y), &v) in xs.iter().zip(ys).zip(values) {
            let p = Point2::new(x, y);
            if !points.contains(&p) {
                points.push(p);
                unique_values.push(v);
            }
        }
        if points.len() < MIN_POINTS {
            return Err(PipelineError::InsufficientPoints {
                stage: STAGE,
                found: points.len(),
                required: MIN_POINTS,
            });
        }

        let triangulation = match method {
            InterpolationMethod::Nearest => None,
            _ => Some(Triangulation::new(points.clone())?),
        };
        let gradients = match (&triangulation, method) {
            (Some(tri), InterpolationMethod::Cubic) => vertex_gradients(tri, &unique_values),
            _ => Vec::new(),
        };

        Ok(Self {
            method,
            points,
            values: unique_values,
            triangulation,
            gradients,
        })
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Number of distinct stations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Interpolated value at `(x, y)`; NaN outside the hull for the
    /// triangulated methods.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let p = Point2::new(x, y);
        match (&self.triangulation, self.method) {
            (None, _) | (_, InterpolationMethod::Nearest) => self.nearest(&p),
            (Some(tri), InterpolationMethod::Linear) => match tri.locate(&p) {
                Some(loc) => {
                    let [i, j, k] = tri.triangles()[loc.triangle];
                    let [u, v, w] = loc.weights;
                    u * self.values[i] + v * self.values[j] + w * self.values[k]
                }
                None => f64::NAN,
            },
            (Some(tri), InterpolationMethod::Cubic) => match tri.locate(&p) {
                Some(loc) => self.bezier(tri, loc.triangle, loc.weights),
                None => f64::NAN,
            },
        }
    }

    /// Evaluates at every node of `grid`.
    pub fn to_field(&self, grid: &Arc<Grid>) -> Result<GridField> {
        let values = grid
            .xs()
            .par_iter()
            .zip(grid.ys().par_iter())
            .map(|(&x, &y)| self.evaluate(x, y))
            .collect();
        GridField::new(Arc::clone(grid), values)
    }

    fn nearest(&self, p: &Point2<f64>) -> f64 {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, q) in self.points.iter().enumerate() {
            let d = (q - p).norm_squared();
            if d < best_dist {
                best = i;
                best_dist = d;
            }
        }
        self.values[best]
    }

    fn bezier(&self, tri: &Triangulation, t: usize, weights: [f64; 3]) -> f64 {
        let [i, j, k] = tri.triangles()[t];
        let pts = tri.points();
        let (p1, p2, p3) = (pts[i], pts[j], pts[k]);
        let (f1, f2, f3) = (self.values[i], self.values[j], self.values[k]);
        let (g1, g2, g3) = (self.gradients[i], self.gradients[j], self.gradients[k]);

        // Edge control points from the vertex tangent planes
        let b210 = f1 + g1.dot(&(p2 - p1)) / 3.0;
        let b201 = f1 + g1.dot(&(p3 - p1)) / 3.0;
        let b120 = f2 + g2.dot(&(p1 - p2)) / 3.0;
        let b021 = f2 + g2.dot(&(p3 - p2)) / 3.0;
        let b102 = f3 + g3.dot(&(p1 - p3)) / 3.0;
        let b012 = f3 + g3.dot(&(p2 - p3)) / 3.0;
        let edge_mean = (b210 + b201 + b120 + b021 + b102 + b012) / 6.0;
        let vertex_mean = (f1 + f2 + f3) / 3.0;
        let b111 = edge_mean + (edge_mean - vertex_mean) / 2.0;

        let [u, v, w] = weights;
        f1 * u.powi(3)
            + f2 * v.powi(3)
            + f3 * w.powi(3)
            + 3.0 * (b210 * u * u * v + b201 * u * u * w + b120 * u * v * v)
            + 3.0 * (b021 * v * v * w + b102 * u * w * w + b012 * v * w * w)
            + 6.0 * b111 * u * v * w
    }
}

/// Least-squares gradient at each vertex from its triangulation
/// neighbours.
fn vertex_gradients(tri: &Triangulation, values: &[f64]) -> Vec<Vector2<f64>> {
    let points = tri.points();
    tri.neighbours()
        .iter()
        .enumerate()
        .map(|(i, ns)| {
            let mut normal = Matrix2::zeros();
            let mut rhs = Vector2::zeros();
            for &j in ns {
                let d = points[j] - points[i];
                normal += d * d.transpose();
                rhs += d * (values[j] - values[i]);
            }
            normal
                .try_inverse()
                .map(|inv| inv * rhs)
                .unwrap_or_else(Vector2::zeros)
        })
        .collect()
}

/// Interpolates scattered values onto every node of `grid`.
pub fn interpolate(
    grid: &Arc<Grid>,
    xs: &[f64],
    ys: &[f64],
    values: &[f64],
    method: InterpolationMethod,
) -> Result<GridField> {
    ScatteredInterpolator::new(xs, ys, values, method)?.to_field(grid)
}
