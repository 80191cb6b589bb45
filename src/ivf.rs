//! Inverted-file construction.
//!
//! After all chunks are on disk, the concatenated centroid codes are
//! inverted into a permutation of global embedding ids grouped by centroid,
//! plus the per-centroid group lengths needed to index into it.

use std::path::Path;

use tracing::info;

use crate::error::{IndexError, Result};
use crate::manifest::{IVF_FILE, IVF_LENGTHS_FILE, codes_file};
use crate::tensor;

/// The inverted file: embedding ids grouped by centroid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ivf {
    /// Permutation of `0..n_total`, ordered by centroid code. The sort is
    /// stable, so ids within one centroid stay ascending.
    pub permutation: Vec<u32>,
    /// Embeddings assigned to each centroid; sums to `n_total`.
    pub lengths: Vec<u32>,
}

/// Invert an in-memory code stream.
pub fn invert_codes(codes: &[u32], num_partitions: usize) -> Ivf {
    let mut permutation: Vec<u32> = (0..codes.len() as u32).collect();
    permutation.sort_by_key(|&id| codes[id as usize]);

    let mut lengths = vec![0u32; num_partitions];
    for &code in codes {
        lengths[code as usize] += 1;
    }

    Ivf {
        permutation,
        lengths,
    }
}

/// Read every chunk's codes in chunk order, invert them, and persist the
/// `ivf` and `ivf_lengths` tensors.
pub fn build(index_path: &Path, num_chunks: usize, num_partitions: usize) -> Result<Ivf> {
    let mut codes = Vec::new();
    for chunk_idx in 0..num_chunks {
        let path = index_path.join(codes_file(chunk_idx));
        let (_, chunk_codes) = tensor::read_u32(&path)?;
        if let Some(&bad) = chunk_codes.iter().find(|&&c| c as usize >= num_partitions) {
            return Err(IndexError::format(&path)(format!(
                "centroid code {bad} out of range for {num_partitions} partitions"
            )));
        }
        codes.extend(chunk_codes);
    }

    let ivf = invert_codes(&codes, num_partitions);
    info!(
        num_embeddings = ivf.permutation.len(),
        num_partitions, "built inverted file"
    );

    tensor::write_u32(
        &index_path.join(IVF_FILE),
        &[ivf.permutation.len()],
        &ivf.permutation,
    )?;
    tensor::write_u32(
        &index_path.join(IVF_LENGTHS_FILE),
        &[ivf.lengths.len()],
        &ivf.lengths,
    )?;

    Ok(ivf)
}
