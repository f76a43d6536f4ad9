//! Utility types shared across the baker.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam plus [`Aabb`]

mod error;
mod math;

pub use error::*;
pub use math::*;
