//! Sobol sequence direction matrices.
//!
//! Dimension 0 is the van der Corput sequence; the others use the Joe-Kuo
//! primitive polynomials. The flattened table is `SOBOL_DIMS × SOBOL_SIZE`
//! direction numbers, row-major by dimension, ready for buffer upload.

use std::sync::LazyLock;

/// Number of dimensions: two for the primary direction, two per bounce.
pub const SOBOL_DIMS: usize = 10;

/// Direction numbers per dimension (bits of precision).
pub const SOBOL_SIZE: usize = 32;

/// (degree s, coefficients a, initial m_i) for dimensions 1..SOBOL_DIMS.
const JOE_KUO: [(u32, u32, &[u32]); SOBOL_DIMS - 1] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
];

static SOBOL_MATRICES: LazyLock<Vec<u32>> = LazyLock::new(build_matrices);

fn build_matrices() -> Vec<u32> {
    let mut table = vec![0u32; SOBOL_DIMS * SOBOL_SIZE];

    for (k, v) in table[..SOBOL_SIZE].iter_mut().enumerate() {
        *v = 1 << (31 - k);
    }

    for (d, &(s, a, m)) in JOE_KUO.iter().enumerate() {
        let s = s as usize;
        let v = &mut table[(d + 1) * SOBOL_SIZE..(d + 2) * SOBOL_SIZE];
        for k in 0..SOBOL_SIZE {
            v[k] = if k < s {
                m[k] << (31 - k)
            } else {
                let mut x = v[k - s] ^ (v[k - s] >> s);
                for i in 1..s {
                    if (a >> (s - 1 - i)) & 1 == 1 {
                        x ^= v[k - i];
                    }
                }
                x
            };
        }
    }

    table
}

/// Process-wide Sobol direction matrices.
pub fn sobol_matrices() -> &'static [u32] {
    &SOBOL_MATRICES
}

/// Evaluate dimension `dim` of sample `index` against a direction table.
#[inline]
pub fn sample_from(matrices: &[u32], index: u32, dim: usize) -> f32 {
    let row = &matrices[dim * SOBOL_SIZE..(dim + 1) * SOBOL_SIZE];
    let mut bits = index;
    let mut x = 0u32;
    let mut k = 0;
    while bits != 0 {
        if bits & 1 == 1 {
            x ^= row[k];
        }
        bits >>= 1;
        k += 1;
    }
    // Keep 24 bits so the result stays strictly below 1.0
    (x >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
}

/// Evaluate dimension `dim` of sample `index`.
#[inline]
pub fn sobol_sample(index: u32, dim: usize) -> f32 {
    sample_from(sobol_matrices(), index, dim)
}
