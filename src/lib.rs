//! weft: a compressed, cluster-partitioned index builder for
//! late-interaction retrieval.
//!
//! A late-interaction model represents each passage as a variable-length
//! sequence of fixed-dimension embeddings. weft stores those embeddings
//! compactly — each as a centroid id plus a few bits of quantized residual
//! per dimension — and groups them by centroid so a search layer can probe
//! only the clusters near a query.
//!
//! # Pipeline
//!
//! ```text
//! Sampler → Planner → Trainer → Chunk Encoder → IVF Builder → Manifest
//! ```
//!
//! 1. [`sampler`] draws a representative passage subset and splits its
//!    embeddings into a clustering sample and a held-out set.
//! 2. [`plan`] sizes the index: chunk size, chunk count, partition count.
//! 3. [`kmeans`] trains the partition centroids; [`codec`] calibrates the
//!    residual buckets on the held-out split.
//! 4. [`chunk`] streams the full collection, compressing and persisting
//!    one chunk at a time.
//! 5. [`ivf`] inverts the concatenated centroid codes into per-centroid
//!    posting groups.
//! 6. [`manifest`] finalizes chunk offsets and verifies the directory.
//!
//! The neural encoder stays outside the crate behind
//! [`PassageEncoder`]; the hot assignment kernel sits behind
//! [`VectorBackend`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use weft::{Collection, IndexConfig, Indexer};
//!
//! let collection = Collection::load("collection.tsv".as_ref())?;
//! let mut config = IndexConfig::new("indexes/msmarco");
//! config.seed = Some(42);
//!
//! let indexer = Indexer::new(config, &encoder)?;
//! let plan = indexer.run(&collection)?;
//! println!("built {} chunks over {} partitions", plan.num_chunks, plan.num_partitions);
//! ```

pub mod backend;
pub mod chunk;
pub mod codec;
pub mod collection;
pub mod config;
pub mod encoder;
pub mod error;
pub mod indexer;
pub mod ivf;
pub mod kmeans;
pub mod manifest;
pub mod plan;
pub mod sampler;
pub mod simd;
pub mod tensor;

pub use backend::{CpuBackend, VectorBackend};
pub use codec::ResidualCodec;
pub use collection::Collection;
pub use config::IndexConfig;
pub use encoder::{EncodedBatch, PassageEncoder};
pub use error::{IndexError, Result};
pub use indexer::Indexer;
pub use ivf::Ivf;
pub use plan::IndexPlan;
