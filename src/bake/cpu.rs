//! CPU reference backend.
//!
//! Builds a SAH BVH on the host and traces sky rays with rayon. A dispatch
//! returns only after every probe in it has been traced, so the driver's
//! submit-then-wait step semantics hold trivially.

use std::f32::consts::PI;

use rayon::prelude::*;

use super::backend::{BakeResources, RayTracingBackend, ResourceDesc};
use super::params::{ParamBlock, ShaderParam};
use crate::sampling::{
    closest_direction_index, cranley_patterson_rotations, rotated_sample, sky_directions, sobol_matrices,
    warp::{cosine_hemisphere, uniform_sphere},
};
use crate::scene::{AccelStruct, Ray};
use crate::util::{Error, Result, Vec3, Vec4};

/// SH band 0 basis constant.
const SH_L0: f32 = 0.282_095;
/// SH band 1 basis constant.
const SH_L1: f32 = 0.488_603;

/// Per-axis dispatch limit matching common GPU hardware.
pub const DEFAULT_MAX_DISPATCH_WIDTH: u32 = 65_535;

/// Host backend: BVH traversal on the rayon pool.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    max_dispatch_width: u32,
    memory_budget: Option<usize>,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self {
            max_dispatch_width: DEFAULT_MAX_DISPATCH_WIDTH,
            memory_budget: None,
        }
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit probes per dispatch. Zero is treated as one.
    pub fn with_max_dispatch_width(mut self, width: u32) -> Self {
        self.max_dispatch_width = width.max(1);
        self
    }

    /// Fail allocation when resources would exceed `bytes`.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = Some(bytes);
        self
    }
}

impl RayTracingBackend for CpuBackend {
    type Resources = CpuResources;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn max_dispatch_width(&self) -> u32 {
        self.max_dispatch_width
    }

    #[tracing::instrument(skip_all, fields(probes = desc.positions.len()))]
    fn allocate(&self, desc: &ResourceDesc<'_>) -> Result<CpuResources> {
        let accel = desc.scene.build_accel();
        let probe_count = desc.positions.len();
        let direction_slots = if desc.shading_direction { probe_count } else { 0 };

        let sobol = sobol_matrices().to_vec();
        let cpr = cranley_patterson_rotations();
        let directions = sky_directions().to_vec();

        let required = accel.size_bytes()
            + probe_count * (std::mem::size_of::<Vec3>() + std::mem::size_of::<Vec4>())
            + direction_slots * (std::mem::size_of::<Vec3>() + std::mem::size_of::<u32>())
            + sobol.len() * std::mem::size_of::<u32>()
            + cpr.len() * std::mem::size_of::<f32>()
            + directions.len() * std::mem::size_of::<Vec3>();

        if let Some(budget) = self.memory_budget {
            if required > budget {
                return Err(Error::resource(format!(
                    "bake needs {required} bytes, budget is {budget}"
                )));
            }
        }

        tracing::debug!(
            triangles = accel.triangle_count(),
            bytes = required,
            "allocated CPU bake resources"
        );

        Ok(CpuResources {
            accel,
            positions: desc.positions.to_vec(),
            occlusion: vec![Vec4::ZERO; probe_count],
            shading: vec![Vec3::ZERO; direction_slots],
            direction_index: vec![0; direction_slots],
            sobol,
            cpr,
            directions,
        })
    }
}

/// Host-side buffers for one bake.
pub struct CpuResources {
    accel: AccelStruct,
    positions: Vec<Vec3>,
    occlusion: Vec<Vec4>,
    shading: Vec<Vec3>,
    direction_index: Vec<u32>,
    sobol: Vec<u32>,
    cpr: Vec<f32>,
    directions: Vec<Vec3>,
}

impl Drop for CpuResources {
    fn drop(&mut self) {
        tracing::trace!(probes = self.positions.len(), "released CPU bake resources");
    }
}

/// Read-only state shared by every probe of a dispatch.
struct Kernel<'a> {
    accel: &'a AccelStruct,
    sobol: &'a [u32],
    cpr: &'a [f32],
    sample_id: u32,
    max_bounces: u32,
    offset_ray: f32,
    average_albedo: f32,
    cull: bool,
    /// 4π / sample count: uniform sphere pdf folded with the sample average.
    norm: f32,
}

/// Outcome of one path.
struct PathSample {
    /// SH projection of the escaped path, already normalized.
    sh: Vec4,
    /// Primary direction scaled by path weight if the path escaped.
    escaped_dir: Option<Vec3>,
}

impl Kernel<'_> {
    fn sample(&self, slot: u32, dim: usize) -> f32 {
        rotated_sample(self.sobol, self.cpr, self.sample_id, dim, slot)
    }

    fn trace(&self, slot: u32, position: Vec3) -> PathSample {
        let primary = uniform_sphere(self.sample(slot, 0), self.sample(slot, 1));
        let mut ray = Ray::new(position + primary * self.offset_ray, primary);
        let mut weight = 1.0;

        for bounce in 0..=self.max_bounces {
            let Some(hit) = self.accel.closest_hit(&ray, f32::INFINITY, self.cull) else {
                let sh = Vec4::new(SH_L0, SH_L1 * primary.y, SH_L1 * primary.z, SH_L1 * primary.x);
                return PathSample {
                    sh: sh * (weight * self.norm),
                    escaped_dir: Some(primary * weight),
                };
            };

            if bounce == self.max_bounces {
                break;
            }

            let dim = 2 + 2 * bounce as usize;
            let p = ray.origin + ray.dir * hit.t;
            let dir = cosine_hemisphere(hit.normal, self.sample(slot, dim), self.sample(slot, dim + 1));
            ray = Ray::new(p + hit.normal * self.offset_ray, dir);
            weight *= self.average_albedo;
        }

        PathSample {
            sh: Vec4::ZERO,
            escaped_dir: None,
        }
    }
}

impl BakeResources for CpuResources {
    fn dispatch(&mut self, params: &ParamBlock, width: u32) -> Result<()> {
        let sample_count = params.u32(ShaderParam::SampleCount)?;
        let sample_id = params.u32(ShaderParam::SampleId)?;
        let offset = params.u32(ShaderParam::ProbeOffset)? as usize;
        let bake_direction = params.bool(ShaderParam::BakeSkyShadingDirection)?;

        let end = offset + width as usize;
        if end > self.positions.len() {
            return Err(Error::resource(format!(
                "dispatch covers probes {offset}..{end}, buffer holds {}",
                self.positions.len()
            )));
        }
        if bake_direction && self.shading.len() < end {
            return Err(Error::resource("shading direction buffers were not allocated"));
        }
        if sample_count == 0 {
            return Err(Error::resource("sample count is zero"));
        }

        let kernel = Kernel {
            accel: &self.accel,
            sobol: &self.sobol,
            cpr: &self.cpr,
            sample_id,
            max_bounces: params.u32(ShaderParam::MaxBounces)?,
            offset_ray: params.f32(ShaderParam::OffsetRay)?,
            average_albedo: params.f32(ShaderParam::AverageAlbedo)?,
            cull: params.bool(ShaderParam::BackFaceCulling)?,
            norm: 4.0 * PI / sample_count as f32,
        };
        let positions = &self.positions[offset..end];
        let first_sample = sample_id == 0;
        let last_sample = sample_id + 1 >= sample_count;

        if bake_direction {
            let directions = &self.directions;
            self.occlusion[offset..end]
                .par_iter_mut()
                .zip(self.shading[offset..end].par_iter_mut())
                .zip(self.direction_index[offset..end].par_iter_mut())
                .enumerate()
                .for_each(|(i, ((occ, shading), dir_index))| {
                    if first_sample {
                        *occ = Vec4::ZERO;
                        *shading = Vec3::ZERO;
                    }
                    let path = kernel.trace((offset + i) as u32, positions[i]);
                    *occ += path.sh;
                    if let Some(d) = path.escaped_dir {
                        *shading += d;
                    }
                    if last_sample {
                        *dir_index = closest_direction_index(directions, shading.normalize_or_zero());
                    }
                });
        } else {
            self.occlusion[offset..end]
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, occ)| {
                    if first_sample {
                        *occ = Vec4::ZERO;
                    }
                    *occ += kernel.trace((offset + i) as u32, positions[i]).sh;
                });
        }

        Ok(())
    }

    fn read_occlusion(&self) -> Result<Vec<Vec4>> {
        Ok(self.occlusion.clone())
    }

    fn read_direction_indices(&self) -> Result<Vec<u32>> {
        Ok(self.direction_index.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{instance::box_mesh, Scene, ShadowCasting};

    fn bind(params: &mut ParamBlock, samples: u32, bounces: u32, direction: bool) {
        params.set_u32(ShaderParam::SampleCount, samples);
        params.set_u32(ShaderParam::MaxBounces, bounces);
        params.set_u32(ShaderParam::ProbeOffset, 0);
        params.set_f32(ShaderParam::OffsetRay, 0.015);
        params.set_f32(ShaderParam::AverageAlbedo, 0.6);
        params.set_bool(ShaderParam::BackFaceCulling, false);
        params.set_bool(ShaderParam::BakeSkyShadingDirection, direction);
    }

    fn run(scene: &Scene, positions: &[Vec3], samples: u32, bounces: u32, direction: bool) -> CpuResources {
        let desc = ResourceDesc { scene, positions, shading_direction: direction };
        let mut res = CpuBackend::new().allocate(&desc).unwrap();
        let mut params = ParamBlock::new();
        bind(&mut params, samples, bounces, direction);
        for s in 0..samples {
            params.set_u32(ShaderParam::SampleId, s);
            res.dispatch(&params, positions.len() as u32).unwrap();
        }
        res
    }

    #[test]
    fn test_open_sky_is_fully_visible() {
        let res = run(&Scene::new(), &[Vec3::ZERO], 64, 0, false);
        let occ = res.read_occlusion().unwrap()[0];
        let expected_l0 = 4.0 * PI * SH_L0;
        assert!((occ.x - expected_l0).abs() < 1e-3, "L0 {} vs {}", occ.x, expected_l0);
        // Sobol-stratified directions nearly cancel in band 1
        assert!(occ.y.abs() < 0.3 && occ.z.abs() < 0.3 && occ.w.abs() < 0.3, "{occ:?}");
    }

    #[test]
    fn test_enclosed_probe_sees_no_sky() {
        let mut scene = Scene::new();
        scene.add_mesh(box_mesh(Vec3::ZERO, Vec3::ONE, ShadowCasting::On));
        let res = run(&scene, &[Vec3::ZERO], 32, 2, false);
        assert_eq!(res.read_occlusion().unwrap()[0], Vec4::ZERO);
    }

    #[test]
    fn test_floor_halves_visibility_and_points_up() {
        let mut scene = Scene::new();
        scene.add_mesh(box_mesh(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1000.0, 0.5, 1000.0), ShadowCasting::On));
        let res = run(&scene, &[Vec3::ZERO], 256, 0, true);

        let occ = res.read_occlusion().unwrap()[0];
        let half = 2.0 * PI * SH_L0;
        assert!((occ.x - half).abs() < 0.15, "L0 {} vs {}", occ.x, half);
        // Band 1 y coefficient carries the upward bias
        assert!(occ.y > 0.5);

        let index = res.read_direction_indices().unwrap()[0];
        let dir = sky_directions()[index as usize];
        assert!(dir.y > 0.8, "dominant direction {dir:?}");
    }

    #[test]
    fn test_out_of_range_dispatch_fails() {
        let positions = [Vec3::ZERO; 2];
        let desc = ResourceDesc { scene: &Scene::new(), positions: &positions, shading_direction: false };
        let mut res = CpuBackend::new().allocate(&desc).unwrap();
        let mut params = ParamBlock::new();
        bind(&mut params, 4, 0, false);
        params.set_u32(ShaderParam::SampleId, 0);
        params.set_u32(ShaderParam::ProbeOffset, 1);
        assert!(matches!(res.dispatch(&params, 2), Err(Error::Resource(_))));
    }

    #[test]
    fn test_memory_budget() {
        let positions = [Vec3::ZERO; 4];
        let desc = ResourceDesc { scene: &Scene::new(), positions: &positions, shading_direction: false };
        let err = CpuBackend::new().with_memory_budget(16).allocate(&desc);
        assert!(matches!(err, Err(Error::Resource(_))));
    }
}
