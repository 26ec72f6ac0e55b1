//! Potential-field kernels.
//!
//! Pure functions, all results in milligals. Observation heights are
//! metres above the datum; voxel centres are negative when buried.

use grasim_env::VoxelSet;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Newtonian constant of gravitation (m^3 kg^-1 s^-2).
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674e-11;

/// m/s^2 to mGal.
pub const SI_TO_MGAL: f64 = 1e5;

/// G expressed in mGal m^2 / kg.
pub const G_MGAL: f64 = GRAVITATIONAL_CONSTANT * SI_TO_MGAL;

/// Free-air gradient (mGal per metre).
pub const FREE_AIR_GRADIENT: f64 = 0.03086;

// Corner sign by octant parity, indexed [k][j][i] (z, y, x corner).
const CORNER_SIGNS: [[[f64; 2]; 2]; 2] = [[[-1.0, 1.0], [1.0, -1.0]], [[1.0, -1.0], [-1.0, 1.0]]];

/// `a * ln(b)` with the `0 * ln(0)` limit taken as zero.
fn xlog(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        0.0
    } else {
        a * b.ln()
    }
}

/// One corner term of the closed-form prism solution.
fn corner_term(dx: f64, dy: f64, dz: f64) -> f64 {
    let r = (dx * dx + dy * dy + dz * dz).sqrt();
    let arctan = if dz == 0.0 {
        0.0
    } else {
        dz * ((dx * dy) / (dz * r)).atan()
    };
    arctan - xlog(dx, r + dy) - xlog(dy, r + dx)
}

/// Vertical gravity of a uniform cube at one observation point.
///
/// `center` is the voxel centre, `edge` its edge length, and `(x, y, z)`
/// the observation point (z = height above datum).
pub fn prism_gravity(density: f64, center: &Vector3<f64>, edge: f64, x: f64, y: f64, z: f64) -> f64 {
    let half = edge / 2.0;
    let dxs = [center.x - half - x, center.x + half - x];
    let dys = [center.y - half - y, center.y + half - y];
    // Depths of the top and bottom faces, measured downward
    let dzs = [-(center.z + half) + z, -(center.z - half) + z];

    let mut sum = 0.0;
    for (k, &dz) in dzs.iter().enumerate() {
        for (j, &dy) in dys.iter().enumerate() {
            for (i, &dx) in dxs.iter().enumerate() {
                sum += CORNER_SIGNS[k][j][i] * corner_term(dx, dy, dz);
            }
        }
    }
    density * G_MGAL * sum
}

/// Sum of `prism_gravity` over every voxel, in voxel order.
pub fn voxel_gravity(voxels: &VoxelSet, density: f64, x: f64, y: f64, z: f64) -> f64 {
    let edge = voxels.edge();
    voxels
        .centers()
        .iter()
        .fold(0.0, |acc, c| acc + prism_gravity(density, c, edge, x, y, z))
}

/// Voxel gravity at many points.
///
/// Points are evaluated in parallel; each point's voxel sum runs in a
/// fixed order, so the output is bit-identical to a serial loop.
pub fn voxel_gravity_field(voxels: &VoxelSet, density: f64, xs: &[f64], ys: &[f64], zs: &[f64]) -> Vec<f64> {
    xs.par_iter()
        .zip(ys.par_iter())
        .zip(zs.par_iter())
        .map(|((&x, &y), &z)| voxel_gravity(voxels, density, x, y, z))
        .collect()
}

/// Gravity of a homogeneous sphere, `G m / r^2`, in mGal.
pub fn sphere_gravity(density: f64, radius: f64, center: &Vector3<f64>, x: f64, y: f64, z: f64) -> f64 {
    let mass = density * (4.0 / 3.0) * PI * radius.powi(3);
    let r2 = (x - center.x).powi(2) + (y - center.y).powi(2) + (z - center.z).powi(2);
    GRAVITATIONAL_CONSTANT * mass / r2 * SI_TO_MGAL
}

/// Terrain gravity from column-mass pairs, in mGal.
///
/// For every node `i`, sums `1/|dh| - 1/|d3|` over all other nodes `j`
/// (horizontal and full 3D separation) and scales by
/// `G * density * resolution^2`. Self terms are zero. Inner sums run
/// sequentially in node order; only the outer loop is parallel.
pub fn terrain_gravity(xs: &[f64], ys: &[f64], elevations: &[f64], resolution: f64, density: f64) -> Vec<f64> {
    let scale = GRAVITATIONAL_CONSTANT * density * resolution * resolution * SI_TO_MGAL;

    (0..xs.len())
        .into_par_iter()
        .map(|i| {
            let (xi, yi, zi) = (xs[i], ys[i], elevations[i]);
            let mut sum = 0.0;
            for j in 0..xs.len() {
                if j == i {
                    continue;
                }
                let dx = xi - xs[j];
                let dy = yi - ys[j];
                let dz = zi - elevations[j];
                let horizontal = (dx * dx + dy * dy).sqrt();
                let full = (dx * dx + dy * dy + dz * dz).sqrt();
                sum += 1.0 / horizontal - 1.0 / full;
            }
            scale * sum
        })
        .collect()
}
