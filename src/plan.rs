//! Sizing decisions derived before training.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Upper bound on passages per chunk.
const MAX_CHUNKSIZE: usize = 25_000;

/// The plan document every downstream stage reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPlan {
    pub chunksize: usize,
    pub num_chunks: usize,
    pub num_partitions: usize,
    pub num_documents: usize,
    pub num_embeddings_est: f64,
    pub avg_doclen_est: f64,
}

impl IndexPlan {
    /// Derive the plan from collection statistics.
    ///
    /// `num_sampled_pids` is the size of the clustering sample drawn by the
    /// sampler; the partition count never exceeds it. `nranks` is the number
    /// of indexing workers (1 in this crate).
    pub fn derive(
        num_documents: usize,
        avg_doclen_est: f64,
        num_sampled_pids: usize,
        chunksize: Option<usize>,
        nranks: usize,
    ) -> Self {
        let chunksize = chunksize.unwrap_or_else(|| MAX_CHUNKSIZE.min(1 + num_documents / nranks));
        let num_chunks = num_documents.div_ceil(chunksize);
        let num_embeddings_est = num_documents as f64 * avg_doclen_est;
        let num_partitions = partition_count(num_sampled_pids, num_embeddings_est);

        Self {
            chunksize,
            num_chunks,
            num_partitions,
            num_documents,
            num_embeddings_est,
            avg_doclen_est,
        }
    }

    /// 0-based pid of the first passage in `chunk_idx`.
    pub fn passage_offset(&self, chunk_idx: usize) -> usize {
        chunk_idx * self.chunksize
    }

    /// One past the last pid of `chunk_idx`.
    pub fn passage_end(&self, chunk_idx: usize) -> usize {
        self.num_documents.min(self.passage_offset(chunk_idx) + self.chunksize)
    }

    /// Write `plan.json`.
    pub fn save(&self, index_path: &Path) -> Result<()> {
        let path = index_path.join("plan.json");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IndexError::format(&path)(e.to_string()))?;
        std::fs::write(&path, json).map_err(IndexError::io("write", &path))
    }

    /// Read `plan.json` back.
    pub fn load(index_path: &Path) -> Result<Self> {
        let path = index_path.join("plan.json");
        let json = std::fs::read_to_string(&path).map_err(IndexError::io("read", &path))?;
        serde_json::from_str(&json).map_err(|e| IndexError::format(&path)(e.to_string()))
    }
}

/// `min(sample size, 2^⌊log2(16·√est)⌋)`, rounded down to a power of two.
/// A non-positive estimate collapses to a single partition.
fn partition_count(num_sampled_pids: usize, num_embeddings_est: f64) -> usize {
    if num_embeddings_est <= 0.0 {
        return 1;
    }
    let target = 16.0 * num_embeddings_est.sqrt();
    let by_size = if target >= 1.0 {
        1usize << (target.log2().floor() as u32)
    } else {
        1
    };
    floor_pow2(num_sampled_pids.min(by_size).max(1))
}

/// Largest power of two ≤ `n` (n ≥ 1).
fn floor_pow2(n: usize) -> usize {
    1 << (usize::BITS - 1 - n.leading_zeros())
}
