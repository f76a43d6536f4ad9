//! Precomputed sky shading directions.
//!
//! A probe's dominant unoccluded direction is stored as an index into this
//! table rather than as a full vector.

use std::sync::LazyLock;

use crate::util::Vec3;

/// Number of precomputed directions.
pub const NUM_SKY_DIRECTIONS: usize = 255;

static SKY_DIRECTIONS: LazyLock<Vec<Vec3>> = LazyLock::new(|| fibonacci_sphere(NUM_SKY_DIRECTIONS));

/// Evenly spread unit vectors using the golden-angle spiral.
fn fibonacci_sphere(count: usize) -> Vec<Vec3> {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
            let r = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden_angle * i as f32;
            Vec3::new(r * theta.cos(), y, r * theta.sin())
        })
        .collect()
}

/// Process-wide direction table.
pub fn sky_directions() -> &'static [Vec3] {
    &SKY_DIRECTIONS
}

/// Index of the table entry with the largest dot product. Ties keep the lowest index.
pub fn closest_direction_index(directions: &[Vec3], direction: Vec3) -> u32 {
    let mut best_dot = f32::NEG_INFINITY;
    let mut best_index = 0;
    for (index, d) in directions.iter().enumerate() {
        let dot = direction.dot(*d);
        if dot > best_dot {
            best_dot = dot;
            best_index = index as u32;
        }
    }
    best_index
}
