//! Scene geometry and ray-tracing acceleration structure.
//!
//! ## Architecture
//! ```text
//! MeshInstance / TerrainDesc → world-space triangles → BVH build (CPU, SAH) → AccelStruct → ray queries
//! ```

pub mod bvh;
pub mod build;
pub mod instance;
pub mod traverse;

pub use bvh::{BvhNode, GpuTriangle, Triangle};
pub use build::{build_bvh, Bvh};
pub use instance::{MeshInstance, Scene, ShadowCasting, TerrainDesc};
pub use traverse::{AccelStruct, Hit, Ray};
