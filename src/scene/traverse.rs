//! Flattened acceleration structure and closest-hit ray queries.

use smallvec::SmallVec;

use super::build::{build_bvh, Bvh};
use super::bvh::{BvhNode, GpuTriangle, Triangle, TRI_FLAG_TWO_SIDED};
use crate::util::Vec3;

/// Triangle hits closer than this are rejected (self-intersection guard).
const HIT_EPSILON: f32 = 1e-6;

/// Ray with origin and (not necessarily normalized) direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }
}

/// Closest intersection along a ray.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f32,
    /// Geometric normal facing the ray origin.
    pub normal: Vec3,
    pub material_id: u32,
    /// Index into [`AccelStruct::triangles`].
    pub triangle: u32,
}

/// BVH nodes plus triangles reordered into leaf order.
pub struct AccelStruct {
    pub nodes: Vec<BvhNode>,
    pub triangles: Vec<GpuTriangle>,
}

impl AccelStruct {
    /// Build from world-space triangles.
    pub fn build(triangles: &[Triangle]) -> Self {
        let bvh = build_bvh(triangles);
        Self::from_bvh(&bvh, triangles)
    }

    /// Reorder triangles according to BVH leaf order for coherent access.
    pub fn from_bvh(bvh: &Bvh, triangles: &[Triangle]) -> Self {
        Self {
            nodes: bvh.nodes.clone(),
            triangles: bvh.tri_indices.iter().map(|&idx| triangles[idx].to_gpu()).collect(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Bytes held by nodes and triangles.
    pub fn size_bytes(&self) -> usize {
        bytemuck::cast_slice::<BvhNode, u8>(&self.nodes).len()
            + bytemuck::cast_slice::<GpuTriangle, u8>(&self.triangles).len()
    }

    /// Find the closest hit in `(0, t_max)`.
    ///
    /// With `cull_back_faces`, triangles seen from behind are ignored unless
    /// they carry [`TRI_FLAG_TWO_SIDED`]. Front faces are clockwise.
    pub fn closest_hit(&self, ray: &Ray, t_max: f32, cull_back_faces: bool) -> Option<Hit> {
        if self.triangles.is_empty() {
            return None;
        }

        let inv_dir = ray.dir.recip();
        let mut best: Option<Hit> = None;
        let mut closest = t_max;

        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        stack.push(0);

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx as usize];
            if node.bounds().intersect_ray(ray.origin, inv_dir, 0.0, closest).is_none() {
                continue;
            }

            if node.is_leaf() {
                let first = node.left_or_first as usize;
                for tri_idx in first..first + node.count as usize {
                    let tri = &self.triangles[tri_idx];
                    if let Some((t, normal)) = intersect_triangle(ray, tri, closest, cull_back_faces) {
                        closest = t;
                        best = Some(Hit {
                            t,
                            normal,
                            material_id: tri.material_id,
                            triangle: tri_idx as u32,
                        });
                    }
                }
            } else {
                stack.push(node.left_or_first + 1);
                stack.push(node.left_or_first);
            }
        }

        best
    }

    /// True if nothing blocks the ray up to `t_max`.
    pub fn is_unoccluded(&self, ray: &Ray, t_max: f32, cull_back_faces: bool) -> bool {
        self.closest_hit(ray, t_max, cull_back_faces).is_none()
    }
}

/// Möller-Trumbore. Returns hit distance and the normal facing the ray.
fn intersect_triangle(ray: &Ray, tri: &GpuTriangle, t_max: f32, cull_back_faces: bool) -> Option<(f32, Vec3)> {
    let v0 = Vec3::from(tri.v0);
    let e1 = Vec3::from(tri.v1) - v0;
    let e2 = Vec3::from(tri.v2) - v0;

    let p = ray.dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-12 {
        return None;
    }

    // Clockwise winding: the front face sees det < 0
    let back_face = det > 0.0;
    if back_face && cull_back_faces && tri.flags & TRI_FLAG_TWO_SIDED == 0 {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - v0;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(e1);
    let v = ray.dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(q) * inv_det;
    if t <= HIT_EPSILON || t >= t_max {
        return None;
    }

    let n = e1.cross(e2).normalize_or_zero();
    let normal = if n.dot(ray.dir) > 0.0 { -n } else { n };
    Some((t, normal))
}
