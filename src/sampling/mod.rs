//! Low-discrepancy sampling tables and sample warping.
//!
//! - [`sobol`] - Sobol direction matrices and sequence evaluation
//! - [`cpr`] - Cranley-Patterson rotation table
//! - [`directions`] - Precomputed sky shading directions
//! - [`warp`] - Square-to-sphere/hemisphere mappings

pub mod cpr;
pub mod directions;
pub mod sobol;
pub mod warp;

pub use cpr::{cranley_patterson_rotations, CPR_TABLE_ROWS};
pub use directions::{closest_direction_index, sky_directions, NUM_SKY_DIRECTIONS};
pub use sobol::{sobol_matrices, sobol_sample, SOBOL_DIMS, SOBOL_SIZE};

/// Sobol sample shifted by the probe's rotation, wrapped to `[0, 1)`.
#[inline]
pub fn rotated_sample(sobol: &[u32], cpr: &[f32], index: u32, dim: usize, probe: u32) -> f32 {
    let row = (probe as usize % CPR_TABLE_ROWS) * SOBOL_DIMS;
    let v = sobol::sample_from(sobol, index, dim) + cpr[row + dim];
    v - v.floor()
}
