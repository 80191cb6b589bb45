//! Index build configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

fn default_dim() -> usize {
    128
}
fn default_nbits() -> usize {
    2
}
fn default_kmeans_niters() -> usize {
    20
}
fn default_index_bsize() -> usize {
    64
}
fn default_doc_maxlen() -> usize {
    220
}
fn default_doc_token() -> String {
    "[D]".to_string()
}
fn default_mask_punctuation() -> bool {
    true
}

/// Options consumed by the build pipeline.
///
/// `doc_maxlen`, `doc_token`, `skiplist`, and `mask_punctuation` are passed
/// through to the encoder untouched; the pipeline only echoes them into
/// `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Source collection, one passage per line. Informational once a
    /// [`crate::collection::Collection`] is constructed.
    #[serde(default)]
    pub collection_path: Option<PathBuf>,

    /// Directory the index is written to.
    pub index_path: PathBuf,

    /// Embedding dimension.
    #[serde(default = "default_dim")]
    pub dim: usize,

    /// Residual bits per dimension.
    #[serde(default = "default_nbits")]
    pub nbits: usize,

    /// k-means iteration cap.
    #[serde(default = "default_kmeans_niters")]
    pub kmeans_niters: usize,

    /// Passages per encoder batch.
    #[serde(default = "default_index_bsize")]
    pub index_bsize: usize,

    /// Passages per chunk; derived from the collection size when unset.
    #[serde(default)]
    pub chunksize: Option<usize>,

    /// Encoder pass-through: token budget per passage.
    #[serde(default = "default_doc_maxlen")]
    pub doc_maxlen: usize,

    /// Encoder pass-through: document marker token.
    #[serde(default = "default_doc_token")]
    pub doc_token: String,

    /// Encoder pass-through: tokens excluded from embedding output.
    #[serde(default)]
    pub skiplist: Vec<String>,

    /// Encoder pass-through: drop punctuation embeddings.
    #[serde(default = "default_mask_punctuation")]
    pub mask_punctuation: bool,

    /// Request accelerator execution for the hot kernels.
    #[serde(default)]
    pub use_gpu: bool,

    /// Seed for all random draws. A fixed seed reproduces the index
    /// byte-for-byte; when unset, a seed is drawn from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl IndexConfig {
    /// Configuration with defaults for everything but the output directory.
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            collection_path: None,
            index_path: index_path.into(),
            dim: default_dim(),
            nbits: default_nbits(),
            kmeans_niters: default_kmeans_niters(),
            index_bsize: default_index_bsize(),
            chunksize: None,
            doc_maxlen: default_doc_maxlen(),
            doc_token: default_doc_token(),
            skiplist: Vec::new(),
            mask_punctuation: default_mask_punctuation(),
            use_gpu: false,
            seed: None,
        }
    }

    /// Reject nonsensical sizes before any work happens.
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(IndexError::Config("dim must be at least 1".to_string()));
        }
        if self.nbits == 0 || self.nbits > 8 {
            return Err(IndexError::Config(format!(
                "nbits must be in 1..=8, got {}",
                self.nbits
            )));
        }
        if self.dim * self.nbits % 8 != 0 {
            return Err(IndexError::Config(format!(
                "dim * nbits must be a multiple of 8, got {} * {}",
                self.dim, self.nbits
            )));
        }
        if self.kmeans_niters == 0 {
            return Err(IndexError::Config(
                "kmeans_niters must be at least 1".to_string(),
            ));
        }
        if self.index_bsize == 0 {
            return Err(IndexError::Config(
                "index_bsize must be at least 1".to_string(),
            ));
        }
        if self.chunksize == Some(0) {
            return Err(IndexError::Config(
                "chunksize must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Echo the full configuration to `config.json` in the index directory.
    pub fn save(&self, index_path: &Path) -> Result<()> {
        let path = index_path.join("config.json");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IndexError::format(&path)(e.to_string()))?;
        std::fs::write(&path, json).map_err(IndexError::io("write", &path))
    }
}
