//! Cranley-Patterson rotation table.
//!
//! One row of `SOBOL_DIMS` offsets per probe slot. Probes pick row
//! `probe % CPR_TABLE_ROWS`, so neighbouring probes decorrelate while the
//! bake stays deterministic.

use super::sobol::SOBOL_DIMS;

/// Rows in the rotation table.
pub const CPR_TABLE_ROWS: usize = 4096;

/// Total float count of the rotation table.
pub const CPR_TABLE_SIZE: usize = CPR_TABLE_ROWS * SOBOL_DIMS;

/// PCG output permutation, used as a stateless integer hash.
#[inline]
fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Build the deterministic rotation table with values in `[0, 1)`.
pub fn cranley_patterson_rotations() -> Vec<f32> {
    (0..CPR_TABLE_SIZE as u32)
        .map(|i| (pcg_hash(i) >> 8) as f32 * (1.0 / (1u32 << 24) as f32))
        .collect()
}
