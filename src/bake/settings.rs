//! Bake settings loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::job::JobSampling;
use crate::sampling::SOBOL_DIMS;
use crate::util::{Error, Result};

/// Bounces supported by the Sobol table: two dimensions for the primary ray, two per bounce.
pub const MAX_BOUNCES: u32 = (SOBOL_DIMS as u32 - 2) / 2;

/// Default job size: the per-axis dispatch limit of common GPUs.
pub const DEFAULT_MAX_PROBES_PER_JOB: usize = 65_535;

/// Sky occlusion bake configuration.
///
/// Copied into the baker at construction so later edits do not affect a bake in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeSettings {
    /// Bake sky occlusion at all.
    pub enabled: bool,
    /// Also bake the dominant sky direction index per probe.
    pub shading_direction: bool,
    /// Samples per probe.
    pub samples: u32,
    /// Indirect bounces per path.
    pub bounces: u32,
    /// Albedo applied at every bounce.
    pub average_albedo: f32,
    pub back_face_culling: bool,
    pub max_probes_per_job: usize,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            shading_direction: false,
            samples: 2048,
            bounces: 2,
            average_albedo: 0.6,
            back_face_culling: false,
            max_probes_per_job: DEFAULT_MAX_PROBES_PER_JOB,
        }
    }
}

impl BakeSettings {
    /// Parse and validate settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Save settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(Error::config("samples must be greater than zero"));
        }
        if self.bounces > MAX_BOUNCES {
            return Err(Error::config(format!("bounces {} exceeds maximum {MAX_BOUNCES}", self.bounces)));
        }
        if !(0.0..=1.0).contains(&self.average_albedo) {
            return Err(Error::config(format!("average_albedo {} outside [0, 1]", self.average_albedo)));
        }
        if self.max_probes_per_job == 0 {
            return Err(Error::config("max_probes_per_job must be greater than zero"));
        }
        Ok(())
    }

    pub fn job_sampling(&self) -> JobSampling {
        JobSampling {
            samples: self.samples,
            bounces: self.bounces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        BakeSettings::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s = BakeSettings::from_json(r#"{ "samples": 64, "shading_direction": true }"#).unwrap();
        assert_eq!(s.samples, 64);
        assert!(s.shading_direction);
        assert_eq!(s.bounces, 2);
        assert!(s.enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{ "samples": 0 }"#,
            r#"{ "bounces": 9 }"#,
            r#"{ "average_albedo": 1.5 }"#,
            r#"{ "max_probes_per_job": 0 }"#,
        ] {
            assert!(matches!(BakeSettings::from_json(json), Err(Error::Configuration(_))), "{json}");
        }
        assert!(matches!(BakeSettings::from_json("{ not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_save_load() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let settings = BakeSettings {
            samples: 128,
            back_face_culling: true,
            ..Default::default()
        };
        settings.save(file.path()).unwrap();
        assert_eq!(BakeSettings::load(file.path()).unwrap(), settings);
    }
}
