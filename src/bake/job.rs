//! Job partitioning.
//!
//! Splits a probe set into contiguous jobs. Job `k` covers flattened slots
//! `start_offset..start_offset + len()` and `indices[i]` is the original
//! probe index stored at flattened slot `start_offset + i`.

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Per-job sampling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSampling {
    /// Total samples per probe.
    pub samples: u32,
    /// Maximum indirect bounces per path.
    pub bounces: u32,
}

/// Contiguous batch of probes baked together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub start_offset: usize,
    pub indices: Vec<u32>,
    pub samples: u32,
    pub bounces: u32,
}

impl Job {
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Flattened slot range covered by this job.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_offset..self.start_offset + self.len()
    }
}

/// Split `probe_count` probes into jobs of at most `max_chunk` probes.
///
/// `original_indices[i]` is the original probe index placed at flattened slot `i`.
/// Every index must be in range and appear once.
pub fn partition(
    probe_count: usize,
    original_indices: &[u32],
    max_chunk: usize,
    sampling: JobSampling,
) -> Result<Vec<Job>> {
    if max_chunk == 0 {
        return Err(Error::config("max probes per job must be greater than zero"));
    }
    if sampling.samples == 0 {
        return Err(Error::config("sample count must be greater than zero"));
    }
    if original_indices.len() != probe_count {
        return Err(Error::config(format!(
            "index map has {} entries for {} probes",
            original_indices.len(),
            probe_count
        )));
    }

    let mut seen = vec![false; probe_count];
    for &idx in original_indices {
        let slot = seen
            .get_mut(idx as usize)
            .ok_or_else(|| Error::config(format!("probe index {idx} out of range (count: {probe_count})")))?;
        if *slot {
            return Err(Error::config(format!("probe index {idx} appears more than once")));
        }
        *slot = true;
    }

    let jobs: Vec<Job> = original_indices
        .chunks(max_chunk)
        .enumerate()
        .map(|(k, chunk)| Job {
            start_offset: k * max_chunk,
            indices: chunk.to_vec(),
            samples: sampling.samples,
            bounces: sampling.bounces,
        })
        .collect();

    tracing::debug!(probes = probe_count, jobs = jobs.len(), max_chunk, "partitioned probes");
    Ok(jobs)
}

/// Partition with the identity index map.
pub fn partition_sequential(probe_count: usize, max_chunk: usize, sampling: JobSampling) -> Result<Vec<Job>> {
    let indices: Vec<u32> = (0..probe_count as u32).collect();
    partition(probe_count, &indices, max_chunk, sampling)
}
