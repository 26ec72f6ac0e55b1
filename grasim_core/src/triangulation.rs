//! Delaunay triangulation of scattered survey stations (Bowyer-Watson).
//!
//! Coordinates are shifted to their centroid and scaled to a unit box
//! before insertion, so the in-circle predicate works on O(1) numbers no
//! matter where the survey sits.

use crate::error::{PipelineError, Result};
use nalgebra::{Point2, Vector2};

const STAGE: &str = "interpolate";

/// Half-size of the enclosing triangle in normalised units.
const SUPER_SCALE: f64 = 100.0;

/// Relative tolerance for collinearity and in-circle ties.
const EPSILON: f64 = 1e-12;

/// Barycentric tolerance when locating a point on a triangle edge.
const LOCATE_TOLERANCE: f64 = 1e-9;

/// A Delaunay triangulation over unique 2D points.
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<Point2<f64>>,
    triangles: Vec<[usize; 3]>,
}

/// A point located inside a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Triangle index
    pub triangle: usize,

    /// Barycentric weights of the three vertices (sum to 1)
    pub weights: [f64; 3],
}

fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b - a).perp(&(c - a))
}

/// Positive when `p` is strictly inside the circumcircle of the
/// counter-clockwise triangle `(a, b, c)`.
fn in_circle(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let (ax, ay) = (a.x - p.x, a.y - p.y);
    let (bx, by) = (b.x - p.x, b.y - p.y);
    let (cx, cy) = (c.x - p.x, c.y - p.y);
    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    ax * (by * c2 - b2 * cy) - ay * (bx * c2 - b2 * cx) + a2 * (bx * cy - by * cx)
}

/// True when every point lies on one line (within tolerance).
pub fn all_collinear(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return true;
    }
    let anchor = points[0];
    let far = points
        .iter()
        .max_by(|a, b| (*a - anchor).norm_squared().total_cmp(&(*b - anchor).norm_squared()))
        .copied()
        .unwrap_or(anchor);
    let span = (far - anchor).norm_squared();
    if span == 0.0 {
        return true;
    }
    points
        .iter()
        .all(|p| orient(&anchor, &far, p).abs() <= EPSILON * span)
}

impl Triangulation {
    /// Triangulates unique points.
    ///
    /// Fails with `InsufficientPoints` below three points and with
    /// `DegenerateGeometry` when the points are collinear.
    pub fn new(points: Vec<Point2<f64>>) -> Result<Self> {
        if points.len() < 3 {
            return Err(PipelineError::InsufficientPoints {
                stage: STAGE,
                found: points.len(),
                required: 3,
            });
        }

        let (lo, hi) = points.iter().fold(
            (Vector2::repeat(f64::INFINITY), Vector2::repeat(f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.inf(&p.coords), hi.sup(&p.coords)),
        );
        let center = (lo + hi) / 2.0;
        let half = ((hi - lo) / 2.0).max();
        if !(half.is_finite() && half > 0.0) {
            return Err(PipelineError::DegenerateGeometry {
                stage: STAGE,
                message: "survey points do not span an area".to_string(),
            });
        }
        let normalised: Vec<Point2<f64>> = points.iter().map(|p| Point2::from((p.coords - center) / half)).collect();

        if all_collinear(&normalised) {
            return Err(PipelineError::DegenerateGeometry {
                stage: STAGE,
                message: format!("{} survey points are collinear", points.len()),
            });
        }

        let triangles = bowyer_watson(&normalised);
        if triangles.is_empty() {
            return Err(PipelineError::DegenerateGeometry {
                stage: STAGE,
                message: "triangulation produced no triangles".to_string(),
            });
        }

        Ok(Self { points, triangles })
    }

    /// Input points, in original coordinates.
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Counter-clockwise vertex triples.
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Barycentric weights of `p` in triangle `t`.
    pub fn barycentric(&self, t: usize, p: &Point2<f64>) -> [f64; 3] {
        let [i, j, k] = self.triangles[t];
        let (a, b, c) = (&self.points[i], &self.points[j], &self.points[k]);
        let area = orient(a, b, c);
        let wa = orient(p, b, c) / area;
        let wb = orient(a, p, c) / area;
        [wa, wb, 1.0 - wa - wb]
    }

    /// Finds the triangle containing `p`, or `None` outside the hull.
    pub fn locate(&self, p: &Point2<f64>) -> Option<Location> {
        (0..self.triangles.len()).find_map(|t| {
            let weights = self.barycentric(t, p);
            if weights.iter().all(|&w| w >= -LOCATE_TOLERANCE) {
                Some(Location { triangle: t, weights })
            } else {
                None
            }
        })
    }

    /// Indices of the vertices sharing a triangle with each vertex.
    pub fn neighbours(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.points.len()];
        for tri in &self.triangles {
            for a in 0..3 {
                for b in 0..3 {
                    if a != b && !adjacency[tri[a]].contains(&tri[b]) {
                        adjacency[tri[a]].push(tri[b]);
                    }
                }
            }
        }
        adjacency
    }
}

fn bowyer_watson(points: &[Point2<f64>]) -> Vec<[usize; 3]> {
    let n = points.len();
    let mut vertices = points.to_vec();
    vertices.push(Point2::new(-2.0 * SUPER_SCALE, -SUPER_SCALE));
    vertices.push(Point2::new(2.0 * SUPER_SCALE, -SUPER_SCALE));
    vertices.push(Point2::new(0.0, 2.0 * SUPER_SCALE));

    let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

    for (idx, p) in points.iter().enumerate() {
        let (bad, good): (Vec<[usize; 3]>, Vec<[usize; 3]>) = triangles.into_iter().partition(|t| {
            in_circle(&vertices[t[0]], &vertices[t[1]], &vertices[t[2]], p) > EPSILON
        });

        // Cavity boundary: edges of exactly one bad triangle
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for t in &bad {
            for e in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                let shared = bad.iter().any(|o| {
                    o != t && [(o[0], o[1]), (o[1], o[2]), (o[2], o[0])].contains(&(e.1, e.0))
                });
                if !shared {
                    boundary.push(e);
                }
            }
        }

        triangles = good;
        for (a, b) in boundary {
            if orient(&vertices[a], &vertices[b], p).abs() > EPSILON {
                triangles.push([a, b, idx]);
            }
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.iter().all(|&v| v < n))
        .filter(|t| orient(&points[t[0]], &points[t[1]], &points[t[2]]) > EPSILON)
        .collect()
}
