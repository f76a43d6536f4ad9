//! Result aggregation.
//!
//! Scatters the flattened per-job output back to original probe order.

use serde::{Deserialize, Serialize};

use super::job::Job;
use crate::util::{Error, Result, Vec4};

/// Baked sky occlusion in original probe order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkyOcclusionResults {
    /// SH L0 + L1 sky visibility per probe.
    pub occlusion: Vec<Vec4>,
    /// Index into the sky direction table, when shading direction was baked.
    pub direction: Option<Vec<u32>>,
}

impl SkyOcclusionResults {
    pub fn len(&self) -> usize {
        self.occlusion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occlusion.is_empty()
    }
}

/// Scatter flattened buffers into arrays of `probe_count` entries.
///
/// Probes not covered by any job keep default values.
#[tracing::instrument(skip_all, fields(jobs = jobs.len(), probes = probe_count))]
pub fn aggregate(
    jobs: &[Job],
    probe_count: usize,
    raw_occlusion: &[Vec4],
    raw_direction: Option<&[u32]>,
) -> Result<SkyOcclusionResults> {
    let mut occlusion = vec![Vec4::ZERO; probe_count];
    let mut direction = raw_direction.map(|_| vec![0u32; probe_count]);

    for job in jobs {
        let range = job.range();
        let src_occ = raw_occlusion.get(range.clone()).ok_or_else(|| {
            Error::resource(format!(
                "occlusion buffer holds {} entries, job needs {}..{}",
                raw_occlusion.len(),
                range.start,
                range.end
            ))
        })?;
        let src_dir = match raw_direction {
            Some(raw) => Some(raw.get(range.clone()).ok_or_else(|| {
                Error::resource(format!("direction buffer holds {} entries, job needs {}", raw.len(), range.end))
            })?),
            None => None,
        };

        for (i, &dst) in job.indices.iter().enumerate() {
            let dst = dst as usize;
            if dst >= probe_count {
                return Err(Error::resource(format!("probe index {dst} out of range (count: {probe_count})")));
            }
            occlusion[dst] = src_occ[i];
            if let (Some(out), Some(src)) = (direction.as_mut(), src_dir) {
                out[dst] = src[i];
            }
        }
    }

    Ok(SkyOcclusionResults { occlusion, direction })
}
