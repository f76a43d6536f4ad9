//! Batched sky occlusion baking.
//!
//! ## Pipeline
//! ```text
//! partition() → Vec<Job> → SkyOcclusionBaker::start() → step() × N → aggregate → results()
//! ```
//!
//! - [`job`] - Job partitioner
//! - [`driver`] - Sample-step driver state machine
//! - [`aggregate`] - Scatter of flattened results to original probe order
//! - [`backend`] - Ray-tracing backend traits, [`cpu`] - host implementation
//! - [`params`] - Dispatch parameter table
//! - [`events`] - Synchronous event hooks
//! - [`settings`] - JSON bake settings
//! - [`request`] - JSON bake request/report used by the CLI

pub mod aggregate;
pub mod backend;
pub mod cpu;
pub mod driver;
pub mod events;
pub mod job;
pub mod params;
pub mod request;
pub mod settings;

pub use aggregate::{aggregate, SkyOcclusionResults};
pub use backend::{BakeResources, RayTracingBackend, ResourceDesc};
pub use cpu::CpuBackend;
pub use driver::{BakePhase, BakeState, SkyOcclusionBaker, StepResult, OFFSET_RAY, SAMPLES_PER_STEP};
pub use events::{BakeEvent, BakeEventKind, EventHooks};
pub use job::{partition, partition_sequential, Job, JobSampling};
pub use params::{ParamBlock, ParamValue, ShaderParam};
pub use request::{BakeReport, BakeRequest};
pub use settings::BakeSettings;

use crate::scene::Scene;
use crate::util::{Result, Vec3};

/// Bake `positions` against `scene` on the CPU backend in one call.
pub fn bake(scene: Scene, positions: &[Vec3], settings: BakeSettings) -> Result<SkyOcclusionResults> {
    let jobs = partition_sequential(positions.len(), settings.max_probes_per_job, settings.job_sampling())?;
    let mut baker = SkyOcclusionBaker::new(CpuBackend::new(), settings, scene)?;
    baker.start(jobs, positions)?;
    let results = baker.run_to_completion()?.clone();
    baker.dispose();
    Ok(results)
}
