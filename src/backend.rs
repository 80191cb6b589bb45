//! Linear-algebra backend seam.
//!
//! Centroid assignment is the one hot kernel in the pipeline (k-means
//! passes, residual calibration, chunk compression all funnel through it),
//! so it sits behind a trait with a CPU implementation. An accelerator
//! implementation plugs in here without touching the pipeline.

use tracing::warn;

use crate::config::IndexConfig;
use crate::simd;

/// Kernel provider for batched vector-vs-centroid scoring.
pub trait VectorBackend: Send + Sync {
    /// For each `dim`-length vector in the flat `vectors` buffer, the index
    /// of the centroid with the largest dot product. Ties resolve to the
    /// smallest centroid index.
    fn nearest_centroids(&self, vectors: &[f32], centroids: &[f32], dim: usize) -> Vec<u32>;
}

/// Portable CPU backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl VectorBackend for CpuBackend {
    fn nearest_centroids(&self, vectors: &[f32], centroids: &[f32], dim: usize) -> Vec<u32> {
        debug_assert_eq!(vectors.len() % dim, 0);
        debug_assert_eq!(centroids.len() % dim, 0);
        let num_centroids = centroids.len() / dim;

        vectors
            .chunks_exact(dim)
            .map(|vector| {
                let mut best = 0u32;
                let mut best_score = f32::NEG_INFINITY;
                for k in 0..num_centroids {
                    let centroid = &centroids[k * dim..(k + 1) * dim];
                    let score = simd::dot(vector, centroid);
                    if score > best_score {
                        best_score = score;
                        best = k as u32;
                    }
                }
                best
            })
            .collect()
    }
}

/// Pick the backend for a build. There is no accelerator implementation
/// compiled into this crate, so `use_gpu` degrades to the CPU path.
pub fn select_backend(config: &IndexConfig) -> Box<dyn VectorBackend> {
    if config.use_gpu {
        warn!("use_gpu requested but no accelerator backend is available; using CPU");
    }
    Box::new(CpuBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_max_dot_product() {
        let centroids = vec![
            1.0, 0.0, // centroid 0
            0.0, 1.0, // centroid 1
        ];
        let vectors = vec![
            0.9, 0.1, //
            0.2, 0.8, //
        ];
        let codes = CpuBackend.nearest_centroids(&vectors, &centroids, 2);
        assert_eq!(codes, vec![0, 1]);
    }

    #[test]
    fn ties_resolve_to_smallest_index() {
        let centroids = vec![
            1.0, 0.0, // centroid 0
            1.0, 0.0, // centroid 1, identical
        ];
        let vectors = vec![1.0, 0.0];
        let codes = CpuBackend.nearest_centroids(&vectors, &centroids, 2);
        assert_eq!(codes, vec![0]);
    }

    #[test]
    fn empty_input_yields_no_codes() {
        let centroids = vec![1.0, 0.0];
        let codes = CpuBackend.nearest_centroids(&[], &centroids, 2);
        assert!(codes.is_empty());
    }
}
