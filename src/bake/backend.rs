//! Ray-tracing backend seam.
//!
//! A backend turns a scene and probe positions into device resources. The
//! resources own every buffer and the acceleration structure; dropping them
//! releases everything.

use super::params::ParamBlock;
use crate::scene::Scene;
use crate::util::{Result, Vec3, Vec4};

/// Everything a backend needs to allocate bake resources.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDesc<'a> {
    pub scene: &'a Scene,
    /// Probe positions in flattened job order.
    pub positions: &'a [Vec3],
    /// Allocate the shading direction buffers.
    pub shading_direction: bool,
}

/// Device able to run the sky sampling kernel.
pub trait RayTracingBackend {
    type Resources: BakeResources;

    fn name(&self) -> &'static str;

    /// Largest dispatch width (probes per dispatch) the device accepts.
    fn max_dispatch_width(&self) -> u32;

    /// Build the acceleration structure and allocate all buffers.
    fn allocate(&self, desc: &ResourceDesc<'_>) -> Result<Self::Resources>;
}

/// Allocated bake resources.
pub trait BakeResources {
    /// Run one sample for probes `probe_offset..probe_offset + width` and
    /// wait for completion.
    fn dispatch(&mut self, params: &ParamBlock, width: u32) -> Result<()>;

    /// Read back the flattened occlusion buffer.
    fn read_occlusion(&self) -> Result<Vec<Vec4>>;

    /// Read back the flattened direction index buffer.
    fn read_direction_indices(&self) -> Result<Vec<u32>>;
}
