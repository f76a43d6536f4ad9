//! Integration tests for the partition → step → aggregate pipeline.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use sky_bake::bake::{
    partition, partition_sequential, BakeEvent, BakeEventKind, BakePhase, BakeResources, BakeSettings, CpuBackend,
    JobSampling, ParamBlock, RayTracingBackend, ResourceDesc, ShaderParam, SkyOcclusionBaker, SAMPLES_PER_STEP,
};
use sky_bake::scene::{instance::box_mesh, Scene, ShadowCasting};
use sky_bake::util::{Vec3, Vec4};
use sky_bake::Error;

/// One recorded dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Dispatch {
    sample_id: u32,
    offset: u32,
    width: u32,
}

type Log = Rc<RefCell<Vec<Dispatch>>>;

/// Backend that records dispatches and writes each flattened slot's own index
/// plus the number of samples it received.
struct RecordingBackend {
    log: Log,
    max_width: u32,
    fail_on_dispatch: Option<usize>,
    fail_readback: bool,
}

impl RecordingBackend {
    fn new(max_width: u32) -> (Self, Log) {
        let log = Log::default();
        (
            Self {
                log: log.clone(),
                max_width,
                fail_on_dispatch: None,
                fail_readback: false,
            },
            log,
        )
    }
}

struct RecordingResources {
    log: Log,
    occlusion: Vec<Vec4>,
    direction: Vec<u32>,
    fail_on_dispatch: Option<usize>,
    fail_readback: bool,
    readbacks: Rc<RefCell<usize>>,
}

impl RayTracingBackend for RecordingBackend {
    type Resources = RecordingResources;

    fn name(&self) -> &'static str {
        "recording"
    }

    fn max_dispatch_width(&self) -> u32 {
        self.max_width
    }

    fn allocate(&self, desc: &ResourceDesc<'_>) -> sky_bake::Result<RecordingResources> {
        let n = desc.positions.len();
        Ok(RecordingResources {
            log: self.log.clone(),
            // x = flattened slot, y = sample count received, z = probe height
            occlusion: (0..n).map(|i| Vec4::new(i as f32, 0.0, desc.positions[i].y, 0.0)).collect(),
            direction: (0..n as u32).map(|i| 100 + i).collect(),
            fail_on_dispatch: self.fail_on_dispatch,
            fail_readback: self.fail_readback,
            readbacks: Rc::default(),
        })
    }
}

impl BakeResources for RecordingResources {
    fn dispatch(&mut self, params: &ParamBlock, width: u32) -> sky_bake::Result<()> {
        if self.fail_on_dispatch == Some(self.log.borrow().len()) {
            return Err(Error::resource("device lost"));
        }
        let d = Dispatch {
            sample_id: params.u32(ShaderParam::SampleId)?,
            offset: params.u32(ShaderParam::ProbeOffset)?,
            width,
        };
        for slot in d.offset..d.offset + width {
            self.occlusion[slot as usize].y += 1.0;
        }
        self.log.borrow_mut().push(d);
        Ok(())
    }

    fn read_occlusion(&self) -> sky_bake::Result<Vec<Vec4>> {
        *self.readbacks.borrow_mut() += 1;
        if self.fail_readback && *self.readbacks.borrow() == 1 {
            return Err(Error::resource("device lost"));
        }
        Ok(self.occlusion.clone())
    }

    fn read_direction_indices(&self) -> sky_bake::Result<Vec<u32>> {
        Ok(self.direction.clone())
    }
}

fn settings(samples: u32) -> BakeSettings {
    BakeSettings {
        samples,
        bounces: 0,
        shading_direction: true,
        ..Default::default()
    }
}

/// Probe `i` sits at height `i` so results are traceable to their origin.
fn positions(n: usize) -> Vec<Vec3> {
    (0..n).map(|i| Vec3::new(0.0, i as f32, 0.0)).collect()
}

#[test]
fn test_three_probes_two_jobs_in_original_order() {
    let s = settings(20);
    let jobs = partition(3, &[2, 0, 1], 2, s.job_sampling()).unwrap();
    assert_eq!((jobs[0].start_offset, jobs[0].len()), (0, 2));
    assert_eq!((jobs[1].start_offset, jobs[1].len()), (2, 1));

    let (backend, _log) = RecordingBackend::new(1024);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();
    baker.start(jobs, &positions(3)).unwrap();
    let results = baker.run_to_completion().unwrap();

    assert_eq!(results.len(), 3);
    for (orig, occ) in results.occlusion.iter().enumerate() {
        // Position gathered from the original index comes back to the same index
        assert_eq!(occ.z, orig as f32);
        // Every probe got exactly its sample budget
        assert_eq!(occ.y, 20.0);
    }
    // Flattened slot 0 held original probe 2, slot 1 probe 0, slot 2 probe 1
    assert_eq!(results.occlusion[2].x, 0.0);
    assert_eq!(results.occlusion[0].x, 1.0);
    assert_eq!(results.occlusion[1].x, 2.0);
    assert_eq!(results.direction.as_deref(), Some(&[101, 102, 100][..]));
}

#[test]
fn test_each_job_gets_ceil_batches() {
    for samples in [1u32, 15, 16, 17, 33, 64] {
        let s = settings(samples);
        let jobs = partition_sequential(5, 2, s.job_sampling()).unwrap();
        let job_count = jobs.len();

        let (backend, log) = RecordingBackend::new(1024);
        let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();

        let steps_per_job = Rc::new(RefCell::new(vec![0u32; job_count]));
        let counter = steps_per_job.clone();
        baker.on(BakeEventKind::StepCompleted, move |e| {
            if let BakeEvent::StepCompleted { job, .. } = e {
                counter.borrow_mut()[*job] += 1;
            }
        });

        baker.start(jobs, &positions(5)).unwrap();
        baker.run_to_completion().unwrap();

        let expected = samples.div_ceil(SAMPLES_PER_STEP);
        assert!(steps_per_job.borrow().iter().all(|&n| n == expected), "samples={samples}");

        // Sample ids run 0..samples for each job and never repeat
        let mut ids_by_offset: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for d in log.borrow().iter() {
            ids_by_offset.entry(d.offset).or_default().push(d.sample_id);
        }
        assert_eq!(ids_by_offset.keys().copied().collect::<Vec<_>>(), vec![0, 2, 4]);
        for (offset, ids) in &mut ids_by_offset {
            ids.sort_unstable();
            assert_eq!(*ids, (0..samples).collect::<Vec<_>>(), "samples={samples} offset={offset}");
        }
    }
}

#[test]
fn test_wide_jobs_split_into_passes() {
    let s = settings(2);
    let jobs = partition_sequential(10, 10, s.job_sampling()).unwrap();
    let (backend, log) = RecordingBackend::new(4);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();
    baker.start(jobs, &positions(10)).unwrap();
    let results = baker.run_to_completion().unwrap().clone();

    let log = log.borrow();
    assert!(log.iter().all(|d| d.width <= 4));
    let per_sample: Vec<(u32, u32)> = log.iter().filter(|d| d.sample_id == 0).map(|d| (d.offset, d.width)).collect();
    assert_eq!(per_sample, vec![(0, 4), (4, 4), (8, 2)]);
    assert!(results.occlusion.iter().all(|o| o.y == 2.0));
}

#[test]
fn test_step_after_done_is_noop() {
    let s = settings(4);
    let jobs = partition_sequential(3, 2, s.job_sampling()).unwrap();
    let (backend, log) = RecordingBackend::new(1024);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();
    baker.start(jobs, &positions(3)).unwrap();

    let before = baker.run_to_completion().unwrap().clone();
    let dispatches = log.borrow().len();

    for _ in 0..3 {
        assert!(baker.step().unwrap().done);
    }
    assert_eq!(baker.results().unwrap(), &before);
    assert_eq!(log.borrow().len(), dispatches);
    assert_eq!(baker.phase(), BakePhase::Done);
}

#[test]
fn test_progress_tracks_completed_jobs() {
    let s = settings(16);
    let jobs = partition_sequential(5, 2, s.job_sampling()).unwrap();
    let (backend, _log) = RecordingBackend::new(1024);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();
    baker.start(jobs, &positions(5)).unwrap();

    assert_eq!(baker.progress(), (0, 5));
    baker.step().unwrap();
    assert_eq!(baker.progress(), (2, 5));
    baker.step().unwrap();
    assert_eq!(baker.progress(), (4, 5));
    assert!(baker.step().unwrap().done);
    assert_eq!(baker.progress(), (5, 5));
}

#[test]
fn test_dispatch_failure_aborts() {
    let s = settings(32);
    let jobs = partition_sequential(4, 2, s.job_sampling()).unwrap();
    let (mut backend, _log) = RecordingBackend::new(1024);
    backend.fail_on_dispatch = Some(20);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();
    baker.start(jobs, &positions(4)).unwrap();

    baker.step().unwrap();
    let err = baker.step().unwrap_err();
    assert!(matches!(err, Error::Resource(_)));
    assert_eq!(baker.phase(), BakePhase::Aborted);
    assert!(matches!(baker.step(), Err(Error::InvalidState { .. })));
    assert!(baker.results().is_err());
    baker.dispose();
}

#[test]
fn test_readback_failure_aborts() {
    let s = settings(4);
    let jobs = partition_sequential(3, 2, s.job_sampling()).unwrap();
    let (mut backend, _log) = RecordingBackend::new(1024);
    backend.fail_readback = true;
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();
    baker.start(jobs, &positions(3)).unwrap();

    // First job, then second job plus the failing readback
    assert!(!baker.step().unwrap().done);
    let err = baker.step().unwrap_err();
    assert!(matches!(err, Error::Resource(_)));
    assert_eq!(baker.phase(), BakePhase::Aborted);

    // No silent retry of the readback
    assert!(matches!(baker.step(), Err(Error::InvalidState { .. })));
    assert_eq!(baker.phase(), BakePhase::Aborted);
    assert!(baker.results().is_err());
    baker.dispose();
}

#[test]
fn test_allocation_failure_leaves_baker_idle() {
    let s = settings(4);
    let jobs = partition_sequential(8, 4, s.job_sampling()).unwrap();
    let backend = CpuBackend::new().with_memory_budget(64);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();

    let err = baker.start(jobs, &positions(8)).unwrap_err();
    assert!(matches!(err, Error::Resource(_)));
    assert_eq!(baker.phase(), BakePhase::Idle);
    assert!(matches!(baker.step(), Err(Error::InvalidState { .. })));
}

#[test]
fn test_dispose_is_idempotent() {
    let s = settings(64);
    let jobs = partition_sequential(2, 2, s.job_sampling()).unwrap();
    let (backend, _log) = RecordingBackend::new(1024);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();

    let disposed = Rc::new(RefCell::new(0));
    let d = disposed.clone();
    baker.on(BakeEventKind::Disposed, move |_| *d.borrow_mut() += 1);

    baker.start(jobs, &positions(2)).unwrap();
    baker.step().unwrap();
    baker.dispose();
    baker.dispose();

    assert_eq!(*disposed.borrow(), 1);
    assert_eq!(baker.phase(), BakePhase::Aborted);
    assert!(matches!(baker.step(), Err(Error::InvalidState { .. })));
}

#[test]
fn test_results_survive_dispose() {
    let s = settings(4);
    let jobs = partition_sequential(3, 3, s.job_sampling()).unwrap();
    let (backend, _log) = RecordingBackend::new(1024);
    let mut baker = SkyOcclusionBaker::new(backend, s, Scene::new()).unwrap();
    baker.start(jobs, &positions(3)).unwrap();
    baker.run_to_completion().unwrap();
    baker.dispose();
    assert_eq!(baker.phase(), BakePhase::Done);
    assert_eq!(baker.results().unwrap().len(), 3);
}

#[test]
fn test_partition_zero_chunk_is_configuration_error() {
    let err = partition_sequential(10, 0, JobSampling { samples: 8, bounces: 0 }).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_cpu_bake_open_vs_enclosed() {
    let mut scene = Scene::new();
    scene.add_mesh(box_mesh(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE, ShadowCasting::On));

    let probes = [Vec3::new(-1000.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), Vec3::new(8.5, 0.0, 0.0)];
    let s = BakeSettings {
        samples: 64,
        bounces: 1,
        max_probes_per_job: 2,
        ..Default::default()
    };
    let results = sky_bake::bake::bake(scene, &probes, s).unwrap();

    let full = 4.0 * std::f32::consts::PI * 0.282_095;
    assert!((results.occlusion[0].x - full).abs() < 1e-3);
    assert_eq!(results.occlusion[1], Vec4::ZERO);
    // Half a unit from the box face, roughly 30% of the sphere is blocked
    let visible = results.occlusion[2].x / full;
    assert!(visible > 0.55 && visible < 0.85, "visible fraction {visible}");
    assert!(results.direction.is_none());
}
