//! On-disk layout and integrity checking.
//!
//! All index artifacts live flat in one directory:
//!
//! ```text
//! index/
//! ├── config.json           full configuration echo
//! ├── plan.json             sizing decisions
//! ├── centroids             f32 [num_partitions, dim]
//! ├── bucket_cutoffs        f32 [2^nbits − 1]
//! ├── bucket_weights        f32 [2^nbits]
//! ├── avg_residual          f32 scalar
//! ├── {i}.codes             u32 [n_i]
//! ├── {i}.residuals         u8  [n_i, bytes_per_embedding]
//! ├── doclens.{i}           u32 [passages in chunk i]
//! ├── {i}.metadata.json     chunk bookkeeping
//! ├── ivf                   u32 [total embeddings]
//! └── ivf_lengths           u32 [num_partitions]
//! ```

use std::path::Path;

use crate::chunk::ChunkMetadata;
use crate::error::{IndexError, Result};

pub const CONFIG_FILE: &str = "config.json";
pub const PLAN_FILE: &str = "plan.json";
pub const CENTROIDS_FILE: &str = "centroids";
pub const BUCKET_CUTOFFS_FILE: &str = "bucket_cutoffs";
pub const BUCKET_WEIGHTS_FILE: &str = "bucket_weights";
pub const AVG_RESIDUAL_FILE: &str = "avg_residual";
pub const IVF_FILE: &str = "ivf";
pub const IVF_LENGTHS_FILE: &str = "ivf_lengths";

/// Every fixed (non-chunk) file an index directory must contain.
pub const ROOT_FILES: [&str; 8] = [
    CONFIG_FILE,
    PLAN_FILE,
    CENTROIDS_FILE,
    BUCKET_CUTOFFS_FILE,
    BUCKET_WEIGHTS_FILE,
    AVG_RESIDUAL_FILE,
    IVF_FILE,
    IVF_LENGTHS_FILE,
];

pub fn codes_file(chunk_idx: usize) -> String {
    format!("{chunk_idx}.codes")
}

pub fn residuals_file(chunk_idx: usize) -> String {
    format!("{chunk_idx}.residuals")
}

pub fn doclens_file(chunk_idx: usize) -> String {
    format!("doclens.{chunk_idx}")
}

pub fn metadata_file(chunk_idx: usize) -> String {
    format!("{chunk_idx}.metadata.json")
}

/// Recompute every chunk's `embedding_offset` from the cumulative embedding
/// counts and rewrite the metadata files. Returns the total embedding count.
pub fn finalize_offsets(index_path: &Path, num_chunks: usize) -> Result<usize> {
    let mut offset = 0usize;
    for chunk_idx in 0..num_chunks {
        let path = index_path.join(metadata_file(chunk_idx));
        let mut metadata = ChunkMetadata::load(&path)?;
        metadata.embedding_offset = offset;
        metadata.save(&path)?;
        offset += metadata.num_embeddings;
    }
    Ok(offset)
}

/// Verify that the directory holds a complete index for `num_chunks`
/// chunks. Every missing file is collected before failing.
pub fn check_complete(index_path: &Path, num_chunks: usize) -> Result<()> {
    let mut missing = Vec::new();

    for name in ROOT_FILES {
        if !index_path.join(name).exists() {
            missing.push(name.to_string());
        }
    }
    for chunk_idx in 0..num_chunks {
        for name in [
            codes_file(chunk_idx),
            residuals_file(chunk_idx),
            doclens_file(chunk_idx),
            metadata_file(chunk_idx),
        ] {
            if !index_path.join(&name).exists() {
                missing.push(name);
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(IndexError::Incomplete {
            path: index_path.to_path_buf(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn reports_every_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in ROOT_FILES {
            touch(dir.path(), name);
        }
        touch(dir.path(), &codes_file(0));
        touch(dir.path(), &residuals_file(0));
        touch(dir.path(), &doclens_file(0));
        touch(dir.path(), &metadata_file(0));

        assert!(check_complete(dir.path(), 1).is_ok());

        std::fs::remove_file(dir.path().join(codes_file(0))).unwrap();
        std::fs::remove_file(dir.path().join(PLAN_FILE)).unwrap();

        let err = check_complete(dir.path(), 1).unwrap_err();
        match err {
            IndexError::Incomplete { missing, .. } => {
                assert_eq!(missing, vec![PLAN_FILE.to_string(), codes_file(0)]);
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn finalize_rewrites_cumulative_offsets() {
        let dir = tempfile::tempdir().unwrap();
        for (chunk_idx, num_embeddings) in [(0usize, 5usize), (1, 7), (2, 3)] {
            let metadata = ChunkMetadata {
                passage_offset: chunk_idx * 2,
                num_passages: 2,
                num_embeddings,
                embedding_offset: 999, // deliberately wrong
            };
            metadata.save(&dir.path().join(metadata_file(chunk_idx))).unwrap();
        }

        let total = finalize_offsets(dir.path(), 3).unwrap();
        assert_eq!(total, 15);

        let offsets: Vec<usize> = (0..3)
            .map(|i| {
                ChunkMetadata::load(&dir.path().join(metadata_file(i)))
                    .unwrap()
                    .embedding_offset
            })
            .collect();
        assert_eq!(offsets, vec![0, 5, 12]);
    }
}
