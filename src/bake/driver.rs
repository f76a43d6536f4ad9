//! Sample-step driver.
//!
//! ```text
//! Idle --start--> Stepping --last sample of last job--> Draining --aggregate--> Done
//!   \________________\______dispose before Done_______________________________> Aborted
//! ```
//!
//! Each [`SkyOcclusionBaker::step`] issues at most [`SAMPLES_PER_STEP`] samples
//! for the current job and waits for them before advancing any counter.

use super::aggregate::{aggregate, SkyOcclusionResults};
use super::backend::{BakeResources, RayTracingBackend, ResourceDesc};
use super::events::{BakeEvent, BakeEventKind, EventHooks};
use super::job::Job;
use super::params::{ParamBlock, ShaderParam};
use super::settings::BakeSettings;
use crate::scene::Scene;
use crate::util::{Error, Result, Vec3};

/// Sample dispatches issued per step.
pub const SAMPLES_PER_STEP: u32 = 16;

/// Distance sky rays start away from their origin surface or probe.
pub const OFFSET_RAY: f32 = 0.015;

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakePhase {
    Idle,
    Stepping,
    Draining,
    Done,
    Aborted,
}

impl BakePhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Stepping => "Stepping",
            Self::Draining => "Draining",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
        }
    }
}

/// Counters advanced by the driver. Never rewound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BakeState {
    pub current_job: usize,
    /// Samples already issued for the current job.
    pub sample_index: u32,
    pub completed_probes: usize,
}

/// Outcome of one [`SkyOcclusionBaker::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    pub done: bool,
}

/// Cooperative sky occlusion baker over a ray-tracing backend.
///
/// Not reentrant: every mutating call takes `&mut self`.
pub struct SkyOcclusionBaker<B: RayTracingBackend> {
    backend: B,
    settings: BakeSettings,
    scene: Scene,
    phase: BakePhase,
    jobs: Vec<Job>,
    /// Size of the original probe array.
    probe_count: usize,
    /// Probes covered by jobs.
    total_probes: usize,
    state: BakeState,
    params: ParamBlock,
    resources: Option<B::Resources>,
    results: Option<SkyOcclusionResults>,
    hooks: EventHooks,
}

impl<B: RayTracingBackend> SkyOcclusionBaker<B> {
    /// Create an idle baker. Settings are validated and copied.
    pub fn new(backend: B, settings: BakeSettings, scene: Scene) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            backend,
            settings,
            scene,
            phase: BakePhase::Idle,
            jobs: Vec::new(),
            probe_count: 0,
            total_probes: 0,
            state: BakeState::default(),
            params: ParamBlock::new(),
            resources: None,
            results: None,
            hooks: EventHooks::new(),
        })
    }

    pub fn phase(&self) -> BakePhase {
        self.phase
    }

    pub fn state(&self) -> &BakeState {
        &self.state
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Completed and total probe counts.
    pub fn progress(&self) -> (usize, usize) {
        (self.state.completed_probes, self.total_probes)
    }

    /// Register a handler invoked synchronously when `kind` is raised.
    pub fn on(&mut self, kind: BakeEventKind, handler: impl FnMut(&BakeEvent) + 'static) {
        self.hooks.on(kind, handler);
    }

    /// Allocate resources for `jobs`.
    ///
    /// `positions` is indexed by original probe index; it is gathered into
    /// flattened job order before upload.
    #[tracing::instrument(skip_all, fields(jobs = jobs.len(), probes = positions.len()))]
    pub fn start(&mut self, jobs: Vec<Job>, positions: &[Vec3]) -> Result<()> {
        self.expect_phase(BakePhase::Idle)?;

        let flat_positions = gather_positions(&jobs, positions)?;
        self.probe_count = positions.len();

        if !self.settings.enabled {
            tracing::info!("sky occlusion disabled, nothing to bake");
            self.jobs.clear();
            self.total_probes = 0;
            self.phase = BakePhase::Stepping;
            return Ok(());
        }

        let desc = ResourceDesc {
            scene: &self.scene,
            positions: &flat_positions,
            shading_direction: self.settings.shading_direction,
        };
        let resources = self.backend.allocate(&desc)?;

        self.total_probes = flat_positions.len();
        self.jobs = jobs;
        self.resources = Some(resources);
        self.bind_global_params();
        self.phase = BakePhase::Stepping;

        tracing::info!(
            backend = self.backend.name(),
            jobs = self.jobs.len(),
            probes = self.total_probes,
            "sky occlusion bake started"
        );
        self.hooks.emit(&BakeEvent::Started {
            jobs: self.jobs.len(),
            probes: self.total_probes,
        });
        Ok(())
    }

    /// Advance one scheduling tick.
    pub fn step(&mut self) -> Result<StepResult> {
        match self.phase {
            BakePhase::Done => return Ok(StepResult { done: true }),
            BakePhase::Idle | BakePhase::Aborted => {
                return Err(Error::InvalidState {
                    expected: BakePhase::Stepping.name(),
                    actual: self.phase.name(),
                })
            }
            BakePhase::Draining => return self.drain(),
            BakePhase::Stepping => {}
        }

        if self.state.current_job < self.jobs.len() {
            if let Err(e) = self.run_sample_batch() {
                tracing::warn!(error = %e, job = self.state.current_job, "dispatch failed, bake aborted");
                self.phase = BakePhase::Aborted;
                return Err(e);
            }
        }

        if self.state.current_job == self.jobs.len() {
            self.phase = BakePhase::Draining;
            return self.drain();
        }

        Ok(StepResult { done: false })
    }

    /// Step until done and return the results.
    pub fn run_to_completion(&mut self) -> Result<&SkyOcclusionResults> {
        while !self.step()?.done {}
        self.results()
    }

    /// Results in original probe order. Available once a step reported done.
    pub fn results(&self) -> Result<&SkyOcclusionResults> {
        match (&self.results, self.phase) {
            (Some(results), BakePhase::Done) => Ok(results),
            _ => Err(Error::InvalidState {
                expected: BakePhase::Done.name(),
                actual: self.phase.name(),
            }),
        }
    }

    /// Release all backend resources. Idempotent; results survive.
    pub fn dispose(&mut self) {
        let released = self.resources.take().is_some();
        if !matches!(self.phase, BakePhase::Done | BakePhase::Aborted) {
            self.phase = BakePhase::Aborted;
        }
        if released {
            tracing::debug!("sky occlusion resources released");
            self.hooks.emit(&BakeEvent::Disposed);
        }
    }

    fn expect_phase(&self, expected: BakePhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: expected.name(),
                actual: self.phase.name(),
            })
        }
    }

    fn bind_global_params(&mut self) {
        let s = &self.settings;
        self.params.set_bool(ShaderParam::BakeSkyShadingDirection, s.shading_direction);
        self.params.set_bool(ShaderParam::BackFaceCulling, s.back_face_culling);
        self.params.set_f32(ShaderParam::AverageAlbedo, s.average_albedo);
        self.params.set_f32(ShaderParam::OffsetRay, OFFSET_RAY);
    }

    /// Issue up to [`SAMPLES_PER_STEP`] samples for the current job.
    fn run_sample_batch(&mut self) -> Result<()> {
        let job_index = self.state.current_job;
        let job = &self.jobs[job_index];
        let (start, len, samples) = (job.start_offset, job.len(), job.samples);

        self.params.set_u32(ShaderParam::SampleCount, samples);
        self.params.set_u32(ShaderParam::MaxBounces, job.bounces);

        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| Error::resource("bake resources were released"))?;

        let max_width = self.backend.max_dispatch_width().max(1) as usize;
        let batch = SAMPLES_PER_STEP.min(samples.saturating_sub(self.state.sample_index));
        let mut dispatches = 0;

        for _ in 0..batch {
            self.params.set_u32(ShaderParam::SampleId, self.state.sample_index);

            // Jobs wider than the device limit are split into several passes
            let mut pass_start = start;
            while pass_start < start + len {
                let width = max_width.min(start + len - pass_start);
                self.params.set_u32(ShaderParam::ProbeOffset, pass_start as u32);
                resources.dispatch(&self.params, width as u32)?;
                dispatches += 1;
                pass_start += width;
            }

            self.state.sample_index += 1;
        }

        self.hooks.emit(&BakeEvent::StepCompleted {
            job: job_index,
            sample_index: self.state.sample_index,
            dispatches,
        });

        if self.state.sample_index >= samples {
            self.state.completed_probes += len;
            self.state.current_job += 1;
            self.state.sample_index = 0;

            tracing::debug!(
                job = job_index,
                completed = self.state.completed_probes,
                total = self.total_probes,
                "job complete"
            );
            self.hooks.emit(&BakeEvent::JobCompleted {
                job: job_index,
                completed_probes: self.state.completed_probes,
            });
        }

        Ok(())
    }

    /// Read back and scatter results, then finish.
    ///
    /// A failed readback aborts the bake; it is never retried.
    fn drain(&mut self) -> Result<StepResult> {
        let results = match self.read_back() {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "readback failed, bake aborted");
                self.phase = BakePhase::Aborted;
                return Err(e);
            }
        };

        let probes = results.len();
        self.results = Some(results);
        self.phase = BakePhase::Done;

        tracing::info!(probes, "sky occlusion bake finished");
        self.hooks.emit(&BakeEvent::Finished { probes });
        Ok(StepResult { done: true })
    }

    fn read_back(&self) -> Result<SkyOcclusionResults> {
        let Some(resources) = self.resources.as_ref() else {
            // Disabled bake: nothing was allocated or sampled
            return Ok(SkyOcclusionResults::default());
        };
        let occlusion = resources.read_occlusion()?;
        let direction = if self.settings.shading_direction {
            Some(resources.read_direction_indices()?)
        } else {
            None
        };
        aggregate(&self.jobs, self.probe_count, &occlusion, direction.as_deref())
    }
}

/// Validate job layout and gather positions into flattened order.
fn gather_positions(jobs: &[Job], positions: &[Vec3]) -> Result<Vec<Vec3>> {
    let mut flat = Vec::with_capacity(positions.len());
    let mut seen = vec![false; positions.len()];
    for (k, job) in jobs.iter().enumerate() {
        if job.start_offset != flat.len() {
            return Err(Error::config(format!(
                "job {k} starts at {}, expected {}",
                job.start_offset,
                flat.len()
            )));
        }
        if job.samples == 0 {
            return Err(Error::config(format!("job {k} has zero samples")));
        }
        for &idx in &job.indices {
            let p = positions.get(idx as usize).ok_or_else(|| {
                Error::config(format!("job {k} references probe {idx}, only {} positions", positions.len()))
            })?;
            if std::mem::replace(&mut seen[idx as usize], true) {
                return Err(Error::config(format!("job {k} repeats probe {idx}")));
            }
            flat.push(*p);
        }
    }
    Ok(flat)
}
