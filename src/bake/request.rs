//! JSON bake request and report.
//!
//! ```json
//! {
//!   "settings": { "samples": 256, "shading_direction": true },
//!   "scene": { "meshes": [ ... ], "terrains": [ ... ] },
//!   "probes": [[0.0, 1.0, 0.0], [4.0, 1.0, 2.0]]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::aggregate::SkyOcclusionResults;
use super::settings::BakeSettings;
use crate::scene::Scene;
use crate::util::{Result, Vec3};

/// Everything needed for one bake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BakeRequest {
    #[serde(default)]
    pub settings: BakeSettings,
    #[serde(default)]
    pub scene: Scene,
    pub probes: Vec<Vec3>,
}

impl BakeRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let request: Self = serde_json::from_str(json)?;
        request.settings.validate()?;
        Ok(request)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path.as_ref())?)
    }
}

/// Bake output written by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeReport {
    pub probe_count: usize,
    pub occlusion: Vec<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Vec<u32>>,
}

impl From<&SkyOcclusionResults> for BakeReport {
    fn from(results: &SkyOcclusionResults) -> Self {
        Self {
            probe_count: results.len(),
            occlusion: results.occlusion.iter().map(|v| v.to_array()).collect(),
            direction: results.direction.clone(),
        }
    }
}

impl BakeReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
