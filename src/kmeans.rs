//! k-means clustering over the sampled embeddings.
//!
//! Produces the partition centroids. Assignment maximizes dot product (the
//! encoder emits L2-normalized embeddings, so cosine and dot agree); the
//! heavy assignment pass runs through the [`crate::backend::VectorBackend`]
//! seam.

use rand::rngs::StdRng;

use crate::backend::VectorBackend;
use crate::error::{IndexError, Result};

/// k-means trainer for partitioning embeddings.
pub struct KMeans {
    /// Centroids, one `dim`-length block per cluster.
    centroids: Vec<f32>,
    dim: usize,
    k: usize,
    niters: usize,
}

impl KMeans {
    /// Create a trainer for `k` clusters of `dim`-dimensional vectors.
    pub fn new(dim: usize, k: usize, niters: usize) -> Result<Self> {
        if dim == 0 || k == 0 || niters == 0 {
            return Err(IndexError::Config(
                "dim, k, and niters must all be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            centroids: Vec::new(),
            dim,
            k,
            niters,
        })
    }

    /// Train on a flat `dim`-strided sample.
    ///
    /// Initial centroids are `k` distinct sample vectors drawn uniformly
    /// from `rng`; then exactly `niters` assign/update rounds, no early
    /// stop. A cluster that attracts no vectors keeps its previous centroid.
    pub fn fit(
        &mut self,
        vectors: &[f32],
        rng: &mut StdRng,
        backend: &dyn VectorBackend,
    ) -> Result<()> {
        let num_vectors = vectors.len() / self.dim;
        if vectors.len() % self.dim != 0 {
            return Err(IndexError::Degenerate(format!(
                "sample buffer of {} floats is not a multiple of dim {}",
                vectors.len(),
                self.dim
            )));
        }
        if num_vectors < self.k {
            return Err(IndexError::Degenerate(format!(
                "sample of {num_vectors} vectors cannot seed {} clusters",
                self.k
            )));
        }

        self.centroids = Vec::with_capacity(self.k * self.dim);
        for idx in rand::seq::index::sample(rng, num_vectors, self.k) {
            self.centroids
                .extend_from_slice(&vectors[idx * self.dim..(idx + 1) * self.dim]);
        }

        for _ in 0..self.niters {
            let codes = backend.nearest_centroids(vectors, &self.centroids, self.dim);
            self.update_centroids(vectors, &codes);
        }

        Ok(())
    }

    fn update_centroids(&mut self, vectors: &[f32], codes: &[u32]) {
        let mut sums = vec![0.0f32; self.k * self.dim];
        let mut counts = vec![0u32; self.k];

        for (vector, &code) in vectors.chunks_exact(self.dim).zip(codes) {
            let cluster = code as usize;
            counts[cluster] += 1;
            let sum = &mut sums[cluster * self.dim..(cluster + 1) * self.dim];
            for (s, &v) in sum.iter_mut().zip(vector) {
                *s += v;
            }
        }

        for cluster in 0..self.k {
            if counts[cluster] == 0 {
                // Empty cluster: the previous centroid stays.
                continue;
            }
            let inv = 1.0 / counts[cluster] as f32;
            let centroid = &mut self.centroids[cluster * self.dim..(cluster + 1) * self.dim];
            let sum = &sums[cluster * self.dim..(cluster + 1) * self.dim];
            for (c, &s) in centroid.iter_mut().zip(sum) {
                *c = s * inv;
            }
        }
    }

    /// Trained centroids, one `dim`-length block per cluster.
    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    /// Consume the trainer, keeping only the centroid buffer.
    pub fn into_centroids(self) -> Vec<f32> {
        self.centroids
    }
}
