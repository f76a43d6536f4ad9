//! Scene contributors: mesh instances and terrain heightfields.
//!
//! Contributors are flattened to world-space triangles before the BVH build.
//! Instances that do not cast shadows never enter the acceleration structure.

use serde::{Deserialize, Serialize};

use super::bvh::{Triangle, TRI_FLAG_TWO_SIDED};
use super::traverse::AccelStruct;
use crate::util::{Mat4, Vec3};

/// How a contributor casts shadows, which decides its visibility to sky rays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowCasting {
    Off,
    #[default]
    On,
    TwoSided,
    ShadowsOnly,
}

impl ShadowCasting {
    /// Instance mask. Zero masks are excluded from the acceleration structure.
    pub fn mask(self) -> u32 {
        match self {
            Self::Off => 0,
            Self::On | Self::TwoSided | Self::ShadowsOnly => 1,
        }
    }

    fn triangle_flags(self) -> u32 {
        match self {
            Self::TwoSided => TRI_FLAG_TWO_SIDED,
            _ => 0,
        }
    }
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

/// Triangle mesh placed in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshInstance {
    #[serde(default)]
    pub name: String,
    #[serde(default = "identity")]
    pub transform: Mat4,
    pub positions: Vec<Vec3>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u32>,
    #[serde(default)]
    pub shadow_casting: ShadowCasting,
    #[serde(default)]
    pub material_id: u32,
}

impl MeshInstance {
    /// Append world-space triangles. Out-of-range and degenerate triangles are skipped.
    fn collect_triangles(&self, out: &mut Vec<Triangle>) {
        let flags = self.shadow_casting.triangle_flags();
        let world: Vec<Vec3> = self.positions.iter().map(|&p| self.transform.transform_point3(p)).collect();

        for chunk in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (chunk[0] as usize, chunk[1] as usize, chunk[2] as usize);
            if i0 >= world.len() || i1 >= world.len() || i2 >= world.len() {
                continue;
            }
            let tri = Triangle {
                v0: world[i0],
                v1: world[i1],
                v2: world[i2],
                material_id: self.material_id,
                flags,
            };
            if !tri.is_degenerate() {
                out.push(tri);
            }
        }
    }
}

/// Square heightfield terrain.
///
/// `heights` holds `resolution × resolution` samples in `[0, 1]`, row-major
/// along +z. `size` is the world extent: x width, y max height, z depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainDesc {
    #[serde(default = "identity")]
    pub transform: Mat4,
    pub resolution: u32,
    pub size: Vec3,
    pub heights: Vec<f32>,
    #[serde(default)]
    pub shadow_casting: ShadowCasting,
}

impl TerrainDesc {
    /// Two triangles per grid cell, front faces pointing up.
    fn collect_triangles(&self, out: &mut Vec<Triangle>) {
        let res = self.resolution as usize;
        if res < 2 || self.heights.len() < res * res {
            tracing::warn!(resolution = res, samples = self.heights.len(), "terrain heightfield too small, skipped");
            return;
        }

        let step_x = self.size.x / (res - 1) as f32;
        let step_z = self.size.z / (res - 1) as f32;
        let vertex = |x: usize, z: usize| {
            let local = Vec3::new(x as f32 * step_x, self.heights[z * res + x] * self.size.y, z as f32 * step_z);
            self.transform.transform_point3(local)
        };

        let flags = self.shadow_casting.triangle_flags();
        for z in 0..res - 1 {
            for x in 0..res - 1 {
                let a = vertex(x, z);
                let b = vertex(x + 1, z);
                let c = vertex(x + 1, z + 1);
                let d = vertex(x, z + 1);
                for (v0, v1, v2) in [(a, b, c), (a, c, d)] {
                    out.push(Triangle { v0, v1, v2, material_id: 0, flags });
                }
            }
        }
    }
}

/// Collection of sky-ray blockers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub meshes: Vec<MeshInstance>,
    #[serde(default)]
    pub terrains: Vec<TerrainDesc>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: MeshInstance) {
        self.meshes.push(mesh);
    }

    pub fn add_terrain(&mut self, terrain: TerrainDesc) {
        self.terrains.push(terrain);
    }

    /// Flatten every shadow-casting contributor into world-space triangles.
    pub fn triangles(&self) -> Vec<Triangle> {
        let mut tris = Vec::new();

        for mesh in &self.meshes {
            if mesh.shadow_casting.mask() == 0 {
                continue;
            }
            if mesh.indices.len() < 3 {
                tracing::debug!(mesh = %mesh.name, "mesh has no triangles, skipped");
                continue;
            }
            mesh.collect_triangles(&mut tris);
        }

        for terrain in &self.terrains {
            if terrain.shadow_casting.mask() != 0 {
                terrain.collect_triangles(&mut tris);
            }
        }

        tris
    }

    /// Build the acceleration structure for all contributors.
    pub fn build_accel(&self) -> AccelStruct {
        AccelStruct::build(&self.triangles())
    }
}

/// Axis-aligned box with inward-facing (clockwise from inside) triangles.
///
/// Used to enclose probes in tests and demos.
pub fn box_mesh(center: Vec3, half_extent: Vec3, shadow_casting: ShadowCasting) -> MeshInstance {
    let c = |x: f32, y: f32, z: f32| Vec3::new(x, y, z);
    let positions = vec![
        c(-1.0, -1.0, -1.0),
        c(1.0, -1.0, -1.0),
        c(1.0, 1.0, -1.0),
        c(-1.0, 1.0, -1.0),
        c(-1.0, -1.0, 1.0),
        c(1.0, -1.0, 1.0),
        c(1.0, 1.0, 1.0),
        c(-1.0, 1.0, 1.0),
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 0, 3, 2, // -z
        4, 5, 6, 4, 6, 7, // +z
        0, 1, 5, 0, 5, 4, // -y
        3, 6, 2, 3, 7, 6, // +y
        0, 4, 7, 0, 7, 3, // -x
        1, 2, 6, 1, 6, 5, // +x
    ];
    MeshInstance {
        name: "box".to_string(),
        transform: Mat4::from_scale_rotation_translation(half_extent, glam::Quat::IDENTITY, center),
        positions,
        indices,
        shadow_casting,
        material_id: 0,
    }
}
