//! Chunked encoding of the full collection.
//!
//! The collection streams through in fixed-size passage chunks; each chunk
//! is encoded, compressed against the trained codec, and persisted before
//! the next begins. At most one chunk's embeddings are alive at a time.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::VectorBackend;
use crate::codec::ResidualCodec;
use crate::collection::Collection;
use crate::encoder::{PassageEncoder, encode_in_batches};
use crate::error::{IndexError, Result};
use crate::manifest::{codes_file, doclens_file, metadata_file, residuals_file};
use crate::plan::IndexPlan;
use crate::tensor;

/// Per-chunk bookkeeping, stored as `{i}.metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// 0-based pid of the chunk's first passage.
    pub passage_offset: usize,
    /// Passages in this chunk.
    pub num_passages: usize,
    /// Embeddings in this chunk.
    pub num_embeddings: usize,
    /// Global id of the chunk's first embedding.
    pub embedding_offset: usize,
}

impl ChunkMetadata {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IndexError::format(path)(e.to_string()))?;
        std::fs::write(path, json).map_err(IndexError::io("write", path))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(IndexError::io("read", path))?;
        serde_json::from_str(&json).map_err(|e| IndexError::format(path)(e.to_string()))
    }
}

/// Encode, compress, and persist every chunk in pid order.
///
/// Chunk `i` covers pids `[i·chunksize, min(num_docs, (i+1)·chunksize))`;
/// global embedding ids follow the same order, so `embedding_offset` is the
/// running total (re-derived later by the manifest pass).
pub fn encode_chunks<E: PassageEncoder + ?Sized>(
    collection: &Collection,
    encoder: &E,
    codec: &ResidualCodec,
    backend: &dyn VectorBackend,
    plan: &IndexPlan,
    index_bsize: usize,
    index_path: &Path,
) -> Result<Vec<ChunkMetadata>> {
    let mut chunks = Vec::with_capacity(plan.num_chunks);
    let mut embedding_offset = 0usize;

    for chunk_idx in 0..plan.num_chunks {
        let passage_offset = plan.passage_offset(chunk_idx);
        let passage_end = plan.passage_end(chunk_idx);
        let passages = collection.range(passage_offset, passage_end);

        let encoded = encode_in_batches(encoder, passages, index_bsize)?;
        let num_embeddings = encoded.num_embeddings();

        let codes = codec.assign(&encoded.embeddings, backend);
        let packed = codec.compress_residuals(&encoded.embeddings, &codes);

        tensor::write_u32(&index_path.join(codes_file(chunk_idx)), &[num_embeddings], &codes)?;
        tensor::write_u8(
            &index_path.join(residuals_file(chunk_idx)),
            &[num_embeddings, codec.bytes_per_embedding()],
            &packed,
        )?;
        tensor::write_u32(
            &index_path.join(doclens_file(chunk_idx)),
            &[encoded.doclens.len()],
            &encoded.doclens,
        )?;

        let metadata = ChunkMetadata {
            passage_offset,
            num_passages: passages.len(),
            num_embeddings,
            embedding_offset,
        };
        metadata.save(&index_path.join(metadata_file(chunk_idx)))?;

        debug!(
            chunk_idx,
            num_passages = metadata.num_passages,
            num_embeddings,
            "wrote chunk"
        );

        embedding_offset += num_embeddings;
        chunks.push(metadata);
    }

    Ok(chunks)
}
