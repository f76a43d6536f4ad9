//! # sky-bake
//!
//! Batched sky-occlusion baking for light probes.
//!
//! Probes are split into fixed-size jobs, a bounded number of ray-sampling
//! dispatches is issued per scheduling step, and per-probe results are
//! gathered back into original probe order once every job is done.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math re-exports
//! - [`scene`] - Mesh/terrain contributors, SAH BVH, ray queries
//! - [`sampling`] - Sobol tables, Cranley-Patterson rotations, sky directions
//! - [`bake`] - Job partitioner, step driver, aggregator, backends
//!
//! ## Example
//!
//! ```ignore
//! use sky_bake::prelude::*;
//!
//! let settings = BakeSettings::default();
//! let jobs = partition_sequential(positions.len(), settings.max_probes_per_job, settings.job_sampling())?;
//! let mut baker = SkyOcclusionBaker::new(CpuBackend::new(), settings, scene)?;
//! baker.start(jobs, &positions)?;
//! while !baker.step()?.done {}
//! let results = baker.results()?;
//! ```

pub mod util;
pub mod scene;
pub mod sampling;
pub mod bake;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result, Vec3, Vec4, Mat4};
    pub use crate::scene::{MeshInstance, Scene, ShadowCasting, TerrainDesc};
    pub use crate::bake::{
        bake, partition, partition_sequential, BakeEvent, BakeEventKind, BakePhase, BakeSettings,
        CpuBackend, Job, JobSampling, RayTracingBackend, SkyOcclusionBaker, SkyOcclusionResults, StepResult,
    };
}
