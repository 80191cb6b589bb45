//! The passage-encoder seam.
//!
//! The neural encoder (tokenizer, transformer, projection) lives outside
//! this crate. The pipeline depends only on [`PassageEncoder`]: hand it a
//! batch of passage texts, get back one flat embedding buffer plus the
//! per-passage embedding counts.

use crate::error::{IndexError, Result};

/// One encoded batch: a flat `f32` buffer holding `sum(doclens)` embeddings
/// of a fixed dimension, concatenated in passage order.
#[derive(Debug, Clone, Default)]
pub struct EncodedBatch {
    pub embeddings: Vec<f32>,
    pub doclens: Vec<u32>,
}

impl EncodedBatch {
    /// Total embeddings in the batch.
    pub fn num_embeddings(&self) -> usize {
        self.doclens.iter().map(|&len| len as usize).sum()
    }

    /// Fail if the buffer length disagrees with `doclens`.
    pub fn check_shape(&self, dim: usize) -> Result<()> {
        let expected = self.num_embeddings() * dim;
        if self.embeddings.len() != expected {
            return Err(IndexError::Encoder(format!(
                "encoder returned {} floats for doclens summing to {} (dim {dim})",
                self.embeddings.len(),
                self.num_embeddings(),
            )));
        }
        Ok(())
    }

    fn append(&mut self, other: EncodedBatch) {
        self.embeddings.extend(other.embeddings);
        self.doclens.extend(other.doclens);
    }
}

/// Produces per-token embeddings for batches of passages.
///
/// Implementations are expected to return L2-normalized embeddings; the
/// clustering and compression stages score by dot product.
pub trait PassageEncoder {
    /// Embedding dimension of every returned vector.
    fn dim(&self) -> usize;

    /// Encode a batch of passages.
    fn encode(&self, passages: &[String]) -> Result<EncodedBatch>;
}

/// Run the encoder over `passages` in `bsize`-passage batches and
/// concatenate the results, validating shapes per batch.
pub(crate) fn encode_in_batches<E: PassageEncoder + ?Sized>(
    encoder: &E,
    passages: &[String],
    bsize: usize,
) -> Result<EncodedBatch> {
    let dim = encoder.dim();
    let mut out = EncodedBatch::default();
    for batch in passages.chunks(bsize) {
        let encoded = encoder.encode(batch)?;
        encoded.check_shape(dim)?;
        if encoded.doclens.len() != batch.len() {
            return Err(IndexError::Encoder(format!(
                "encoder returned {} doclens for {} passages",
                encoded.doclens.len(),
                batch.len()
            )));
        }
        out.append(encoded);
    }
    Ok(out)
}
