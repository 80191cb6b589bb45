//! Two-level residual compression.
//!
//! Every embedding is stored as its nearest centroid's index plus a
//! quantized residual: each residual component maps to one of `2^nbits`
//! buckets whose cutoffs and reconstruction weights are calibrated from a
//! held-out sample. Decompression is `centroid + bucket_weight` per
//! component.

use std::path::Path;

use crate::backend::VectorBackend;
use crate::error::{IndexError, Result};
use crate::manifest::{AVG_RESIDUAL_FILE, BUCKET_CUTOFFS_FILE, BUCKET_WEIGHTS_FILE, CENTROIDS_FILE};
use crate::tensor;

/// Centroids plus the calibrated residual quantizer.
#[derive(Debug, Clone)]
pub struct ResidualCodec {
    dim: usize,
    nbits: usize,
    /// Centroid matrix, one `dim`-length block per partition.
    centroids: Vec<f32>,
    /// `2^nbits − 1` ascending bucket boundaries.
    bucket_cutoffs: Vec<f32>,
    /// `2^nbits` reconstruction values, one per bucket.
    bucket_weights: Vec<f32>,
    /// Mean absolute residual component over the held-out split.
    avg_residual: f32,
}

impl ResidualCodec {
    /// Calibrate bucket cutoffs and weights from a held-out split.
    ///
    /// Cutoffs sit at the `i/2^nbits` quantiles of the flattened residual
    /// distribution, weights at the bucket midpoints `(i + 0.5)/2^nbits`,
    /// both with type-7 (linearly interpolated) quantiles.
    pub fn calibrate(
        dim: usize,
        nbits: usize,
        centroids: Vec<f32>,
        heldout: &[f32],
        backend: &dyn VectorBackend,
    ) -> Result<Self> {
        let num_buckets = 1usize << nbits;
        let codes = backend.nearest_centroids(heldout, &centroids, dim);

        let mut residuals = Vec::with_capacity(heldout.len());
        for (vector, &code) in heldout.chunks_exact(dim).zip(&codes) {
            let centroid = &centroids[code as usize * dim..(code as usize + 1) * dim];
            for (v, c) in vector.iter().zip(centroid) {
                residuals.push(v - c);
            }
        }

        if residuals.len() < num_buckets {
            return Err(IndexError::Degenerate(format!(
                "{} held-out residual components cannot calibrate {num_buckets} buckets",
                residuals.len()
            )));
        }

        let avg_residual = (residuals.iter().map(|r| r.abs() as f64).sum::<f64>()
            / residuals.len() as f64) as f32;

        residuals.sort_unstable_by(f32::total_cmp);
        let bucket_cutoffs = (1..num_buckets)
            .map(|i| quantile(&residuals, i as f64 / num_buckets as f64))
            .collect();
        let bucket_weights = (0..num_buckets)
            .map(|i| quantile(&residuals, (i as f64 + 0.5) / num_buckets as f64))
            .collect();

        Ok(Self {
            dim,
            nbits,
            centroids,
            bucket_cutoffs,
            bucket_weights,
            avg_residual,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nbits(&self) -> usize {
        self.nbits
    }

    pub fn num_partitions(&self) -> usize {
        self.centroids.len() / self.dim
    }

    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    pub fn bucket_cutoffs(&self) -> &[f32] {
        &self.bucket_cutoffs
    }

    pub fn bucket_weights(&self) -> &[f32] {
        &self.bucket_weights
    }

    pub fn avg_residual(&self) -> f32 {
        self.avg_residual
    }

    /// Packed bytes per embedding.
    pub fn bytes_per_embedding(&self) -> usize {
        (self.dim * self.nbits).div_ceil(8)
    }

    /// Nearest-centroid code for every vector in the flat buffer.
    pub fn assign(&self, vectors: &[f32], backend: &dyn VectorBackend) -> Vec<u32> {
        backend.nearest_centroids(vectors, &self.centroids, self.dim)
    }

    /// Bucket index for one residual component: the number of cutoffs ≤ `r`.
    fn bucketize(&self, r: f32) -> u8 {
        self.bucket_cutoffs.partition_point(|&c| c <= r) as u8
    }

    /// Quantize and pack the residuals of `vectors` against their assigned
    /// centroids. Returns `bytes_per_embedding()` bytes per vector.
    pub fn compress_residuals(&self, vectors: &[f32], codes: &[u32]) -> Vec<u8> {
        debug_assert_eq!(vectors.len(), codes.len() * self.dim);
        let mut packed = Vec::with_capacity(codes.len() * self.bytes_per_embedding());
        let mut indices = vec![0u8; self.dim];

        for (vector, &code) in vectors.chunks_exact(self.dim).zip(codes) {
            let centroid = &self.centroids[code as usize * self.dim..(code as usize + 1) * self.dim];
            for ((slot, v), c) in indices.iter_mut().zip(vector).zip(centroid) {
                *slot = self.bucketize(v - c);
            }
            pack_bits(&indices, self.nbits, &mut packed);
        }

        packed
    }

    /// Reconstruct embeddings from codes and packed residuals
    /// (`centroid + bucket_weight` per component).
    pub fn decompress(&self, codes: &[u32], packed: &[u8]) -> Vec<f32> {
        let bpe = self.bytes_per_embedding();
        debug_assert_eq!(packed.len(), codes.len() * bpe);
        let mut out = Vec::with_capacity(codes.len() * self.dim);

        for (row, &code) in packed.chunks_exact(bpe).zip(codes) {
            let centroid = &self.centroids[code as usize * self.dim..(code as usize + 1) * self.dim];
            let indices = unpack_bits(row, self.nbits, self.dim);
            for (c, idx) in centroid.iter().zip(indices) {
                out.push(c + self.bucket_weights[idx as usize]);
            }
        }

        out
    }

    /// Persist centroids, cutoffs, weights, and the average residual.
    pub fn save(&self, index_path: &Path) -> Result<()> {
        tensor::write_f32(
            &index_path.join(CENTROIDS_FILE),
            &[self.num_partitions(), self.dim],
            &self.centroids,
        )?;
        tensor::write_f32(
            &index_path.join(BUCKET_CUTOFFS_FILE),
            &[self.bucket_cutoffs.len()],
            &self.bucket_cutoffs,
        )?;
        tensor::write_f32(
            &index_path.join(BUCKET_WEIGHTS_FILE),
            &[self.bucket_weights.len()],
            &self.bucket_weights,
        )?;
        tensor::write_f32(&index_path.join(AVG_RESIDUAL_FILE), &[], &[self.avg_residual])
    }

    /// Load a codec back from an index directory.
    pub fn load(index_path: &Path) -> Result<Self> {
        let centroids_path = index_path.join(CENTROIDS_FILE);
        let (shape, centroids) = tensor::read_f32(&centroids_path)?;
        if shape.len() != 2 || shape[1] == 0 {
            return Err(IndexError::format(&centroids_path)(format!(
                "expected a [partitions, dim] matrix, found shape {shape:?}"
            )));
        }
        let dim = shape[1];

        let weights_path = index_path.join(BUCKET_WEIGHTS_FILE);
        let (_, bucket_weights) = tensor::read_f32(&weights_path)?;
        if !bucket_weights.len().is_power_of_two() {
            return Err(IndexError::format(&weights_path)(format!(
                "{} bucket weights is not a power of two",
                bucket_weights.len()
            )));
        }
        let nbits = bucket_weights.len().trailing_zeros() as usize;

        let cutoffs_path = index_path.join(BUCKET_CUTOFFS_FILE);
        let (_, bucket_cutoffs) = tensor::read_f32(&cutoffs_path)?;
        if bucket_cutoffs.len() + 1 != bucket_weights.len() {
            return Err(IndexError::format(&cutoffs_path)(format!(
                "{} cutoffs do not border {} buckets",
                bucket_cutoffs.len(),
                bucket_weights.len()
            )));
        }

        let avg_path = index_path.join(AVG_RESIDUAL_FILE);
        let (_, avg) = tensor::read_f32(&avg_path)?;
        let avg_residual = *avg
            .first()
            .ok_or_else(|| IndexError::format(&avg_path)("empty scalar".to_string()))?;

        Ok(Self {
            dim,
            nbits,
            centroids,
            bucket_cutoffs,
            bucket_weights,
            avg_residual,
        })
    }
}

/// Type-7 quantile (linear interpolation between the two closest order
/// statistics) over an ascending-sorted slice.
pub(crate) fn quantile(sorted: &[f32], q: f64) -> f32 {
    debug_assert!(!sorted.is_empty());
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    if lo + 1 >= sorted.len() {
        return sorted[sorted.len() - 1];
    }
    let frac = h - lo as f64;
    (sorted[lo] as f64 + frac * (sorted[lo + 1] - sorted[lo]) as f64) as f32
}

/// Append `indices` to `out`, each `nbits` wide, filling every byte from
/// the least-significant bit upward. Indices may straddle byte boundaries.
pub(crate) fn pack_bits(indices: &[u8], nbits: usize, out: &mut Vec<u8>) {
    let start = out.len();
    out.resize(start + (indices.len() * nbits).div_ceil(8), 0);
    let bytes = &mut out[start..];

    for (i, &idx) in indices.iter().enumerate() {
        let bit = i * nbits;
        let byte = bit / 8;
        let shift = bit % 8;
        bytes[byte] |= idx << shift;
        if shift + nbits > 8 {
            bytes[byte + 1] |= idx >> (8 - shift);
        }
    }
}

/// Inverse of [`pack_bits`]: read `count` indices of `nbits` each.
pub(crate) fn unpack_bits(bytes: &[u8], nbits: usize, count: usize) -> Vec<u8> {
    let mask = ((1u16 << nbits) - 1) as u8;
    (0..count)
        .map(|i| {
            let bit = i * nbits;
            let byte = bit / 8;
            let shift = bit % 8;
            let mut value = bytes[byte] >> shift;
            if shift + nbits > 8 {
                value |= bytes[byte + 1] << (8 - shift);
            }
            value & mask
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn quantile_interpolates_between_order_statistics() {
        let sorted = [1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-6);
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-6);
    }

    #[test]
    fn uniform_residuals_give_even_buckets() {
        // Residuals uniform in [−1, 1] against a single zero centroid:
        // cutoffs converge to [−0.5, 0, 0.5], weights to
        // [−0.75, −0.25, 0.25, 0.75].
        let mut rng = StdRng::seed_from_u64(42);
        let heldout: Vec<f32> = (0..1_000_000).map(|_| rng.random_range(-1.0..1.0)).collect();
        let codec = ResidualCodec::calibrate(1, 2, vec![0.0], &heldout, &CpuBackend).unwrap();

        for (got, want) in codec.bucket_cutoffs().iter().zip([-0.5f32, 0.0, 0.5]) {
            assert!((got - want).abs() < 1e-2, "cutoff {got} vs {want}");
        }
        for (got, want) in codec
            .bucket_weights()
            .iter()
            .zip([-0.75f32, -0.25, 0.25, 0.75])
        {
            assert!((got - want).abs() < 1e-2, "weight {got} vs {want}");
        }
        // Mean |r| of U(−1, 1) is 0.5.
        assert!((codec.avg_residual() - 0.5).abs() < 1e-2);
        let cutoffs = codec.bucket_cutoffs();
        assert!(cutoffs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn bucketize_counts_cutoffs_at_or_below() {
        let codec = ResidualCodec {
            dim: 1,
            nbits: 2,
            centroids: vec![0.0],
            bucket_cutoffs: vec![-0.5, 0.0, 0.5],
            bucket_weights: vec![-0.75, -0.25, 0.25, 0.75],
            avg_residual: 0.5,
        };
        assert_eq!(codec.bucketize(-0.9), 0);
        assert_eq!(codec.bucketize(-0.5), 1);
        assert_eq!(codec.bucketize(-0.1), 1);
        assert_eq!(codec.bucketize(0.2), 2);
        assert_eq!(codec.bucketize(0.7), 3);
    }

    #[test]
    fn pack_unpack_roundtrip_all_widths() {
        let mut rng = StdRng::seed_from_u64(7);
        for nbits in 1..=8usize {
            let indices: Vec<u8> = (0..64)
                .map(|_| (rng.random::<u16>() % (1 << nbits)) as u8)
                .collect();
            let mut packed = Vec::new();
            pack_bits(&indices, nbits, &mut packed);
            assert_eq!(packed.len(), (64 * nbits).div_ceil(8));
            assert_eq!(unpack_bits(&packed, nbits, 64), indices);
        }
    }

    #[test]
    fn two_bit_packing_is_lsb_first() {
        let mut packed = Vec::new();
        pack_bits(&[0b01, 0b11, 0b00, 0b10], 2, &mut packed);
        // First index in the least-significant bits.
        assert_eq!(packed, vec![0b10_00_11_01]);
    }

    #[test]
    fn compress_decompress_stays_within_residual_range() {
        let dim = 8;
        let mut rng = StdRng::seed_from_u64(13);
        let centroids: Vec<f32> = (0..2 * dim).map(|_| rng.random_range(-1.0..1.0)).collect();
        let heldout: Vec<f32> = (0..256 * dim).map(|_| rng.random_range(-1.0..1.0)).collect();
        let codec =
            ResidualCodec::calibrate(dim, 2, centroids, &heldout, &CpuBackend).unwrap();

        let vectors: Vec<f32> = (0..32 * dim).map(|_| rng.random_range(-1.0..1.0)).collect();
        let codes = codec.assign(&vectors, &CpuBackend);
        let packed = codec.compress_residuals(&vectors, &codes);
        assert_eq!(packed.len(), 32 * codec.bytes_per_embedding());

        let reconstructed = codec.decompress(&codes, &packed);
        assert_eq!(reconstructed.len(), vectors.len());

        // Residual components live in roughly [−2, 2] here, so every
        // reconstructed component must sit within twice that of the truth.
        let max_residual = 4.0f32;
        for (v, r) in vectors.iter().zip(&reconstructed) {
            assert!((v - r).abs() <= 2.0 * max_residual);
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let dim = 4;
        let centroids: Vec<f32> = (0..4 * dim).map(|_| rng.random_range(-1.0..1.0)).collect();
        let heldout: Vec<f32> = (0..64 * dim).map(|_| rng.random_range(-1.0..1.0)).collect();
        let codec =
            ResidualCodec::calibrate(dim, 2, centroids, &heldout, &CpuBackend).unwrap();
        codec.save(dir.path()).unwrap();

        let loaded = ResidualCodec::load(dir.path()).unwrap();
        assert_eq!(loaded.dim(), codec.dim());
        assert_eq!(loaded.nbits(), codec.nbits());
        assert_eq!(loaded.centroids(), codec.centroids());
        assert_eq!(loaded.bucket_cutoffs(), codec.bucket_cutoffs());
        assert_eq!(loaded.bucket_weights(), codec.bucket_weights());
        assert_eq!(loaded.avg_residual(), codec.avg_residual());
    }

    #[test]
    fn too_few_residuals_is_degenerate() {
        let err =
            ResidualCodec::calibrate(1, 2, vec![0.0], &[0.5, -0.5], &CpuBackend).unwrap_err();
        assert!(matches!(err, IndexError::Degenerate(_)));
    }
}
