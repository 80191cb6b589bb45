//! Passage sampling for codec training.
//!
//! Draws a representative subset of the collection, encodes it, and splits
//! the embeddings into a clustering sample and a held-out set used to
//! calibrate the residual buckets.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::collection::Collection;
use crate::encoder::{PassageEncoder, encode_in_batches};
use crate::error::Result;

/// Doclen assumed when sizing the sample, before any passage is encoded.
const TYPICAL_DOCLEN: usize = 120;

/// Held-out embeddings are capped at this count.
const MAX_HELDOUT: f64 = 50_000.0;

/// The sampler's output: flat embedding buffers plus the statistics the
/// planner needs.
#[derive(Debug)]
pub struct SampleSet {
    /// Clustering sample, `dim`-strided.
    pub training: Vec<f32>,
    /// Held-out split for residual calibration, `dim`-strided.
    pub heldout: Vec<f32>,
    /// How many distinct pids were drawn.
    pub num_sampled_pids: usize,
    /// Mean doclen across the sampled passages (0.0 when nothing came back).
    pub avg_doclen_est: f64,
}

/// Number of pids to sample from a collection of `num_docs` passages.
pub fn sample_size(num_docs: usize) -> usize {
    let scaled = 1 + (16.0 * ((TYPICAL_DOCLEN * num_docs) as f64).sqrt()).floor() as usize;
    num_docs.min(scaled)
}

/// Size of the held-out split for `num_sample_embeddings` sample embeddings.
fn heldout_size(num_sample_embeddings: usize) -> usize {
    let capped = MAX_HELDOUT.min(0.05 * num_sample_embeddings as f64).floor() as usize;
    num_sample_embeddings.min(capped.max(1))
}

/// Draw, encode, and split the sample.
///
/// Pids are drawn uniformly without replacement and encoded in ascending
/// order; the embedding columns are then shuffled before the held-out split
/// so the split is not biased toward late pids. All randomness comes from
/// `rng`.
pub fn draw_sample<E: PassageEncoder + ?Sized>(
    collection: &Collection,
    encoder: &E,
    index_bsize: usize,
    rng: &mut StdRng,
) -> Result<SampleSet> {
    let dim = encoder.dim();
    let num_docs = collection.len();
    let num_sampled_pids = sample_size(num_docs);

    let mut pids = rand::seq::index::sample(rng, num_docs, num_sampled_pids).into_vec();
    pids.sort_unstable();

    let texts = collection.select(&pids);
    let encoded = encode_in_batches(encoder, &texts, index_bsize)?;

    let num_embeddings = encoded.num_embeddings();
    let avg_doclen_est = if encoded.doclens.is_empty() {
        0.0
    } else {
        num_embeddings as f64 / encoded.doclens.len() as f64
    };

    info!(
        num_sampled_pids,
        num_embeddings, avg_doclen_est, "sampled collection"
    );

    let mut order: Vec<usize> = (0..num_embeddings).collect();
    order.shuffle(rng);

    let mut shuffled = Vec::with_capacity(num_embeddings * dim);
    for &src in &order {
        shuffled.extend_from_slice(&encoded.embeddings[src * dim..(src + 1) * dim]);
    }

    let num_heldout = if num_embeddings == 0 {
        0
    } else {
        heldout_size(num_embeddings)
    };
    let heldout = shuffled.split_off((num_embeddings - num_heldout) * dim);

    Ok(SampleSet {
        training: shuffled,
        heldout,
        num_sampled_pids,
        avg_doclen_est,
    })
}
