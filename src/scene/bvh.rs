//! BVH node and primitive types.
//!
//! Flat array layout shared by the CPU traversal and any device upload:
//! - 32-byte nodes (cache-line friendly)
//! - 48-byte triangles with flags packed into the vec3 padding

use bytemuck::{Pod, Zeroable};

use crate::util::{Aabb, Vec3};

/// Triangle flag: never back-face culled (two-sided shadow casters).
pub const TRI_FLAG_TWO_SIDED: u32 = 1;

/// BVH node (32 bytes).
///
/// Internal node: left_or_first = left child index, count = 0
/// Leaf node: left_or_first = first triangle index, count > 0
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    /// Leaf or internal node covering `bounds`.
    pub(crate) fn new(bounds: &Aabb, left_or_first: u32, count: u32) -> Self {
        Self {
            aabb_min: bounds.min.to_array(),
            left_or_first,
            aabb_max: bounds.max.to_array(),
            count,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::from(self.aabb_min), Vec3::from(self.aabb_max))
    }
}

/// Triangle primitive in traversal order (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuTriangle {
    pub v0: [f32; 3],
    pub material_id: u32,
    pub v1: [f32; 3],
    pub flags: u32,
    pub v2: [f32; 3],
    pub _pad: u32,
}

/// CPU-side world-space triangle used during BVH build.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub material_id: u32,
    pub flags: u32,
}

impl Triangle {
    /// Compute AABB of this triangle.
    pub fn aabb(&self) -> Aabb {
        let mut b = Aabb::EMPTY;
        b.grow_point(self.v0);
        b.grow_point(self.v1);
        b.grow_point(self.v2);
        b
    }

    /// Centroid of the triangle.
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Zero-area triangles are dropped before the build.
    pub fn is_degenerate(&self) -> bool {
        (self.v1 - self.v0).cross(self.v2 - self.v0).length_squared() <= f32::EPSILON * f32::EPSILON
    }

    /// Convert to the packed traversal format.
    pub fn to_gpu(&self) -> GpuTriangle {
        GpuTriangle {
            v0: self.v0.to_array(),
            material_id: self.material_id,
            v1: self.v1.to_array(),
            flags: self.flags,
            v2: self.v2.to_array(),
            _pad: 0,
        }
    }
}
