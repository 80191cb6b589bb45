//! The sequential build pipeline.
//!
//! One worker drives six stages in order, each reading only what earlier
//! stages flushed: sample → plan → train → encode chunks → invert →
//! finalize. No stage overlaps another; a failure anywhere aborts the
//! build and leaves the partial directory for the existence check to
//! reject.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::backend::{VectorBackend, select_backend};
use crate::chunk;
use crate::codec::ResidualCodec;
use crate::collection::Collection;
use crate::config::IndexConfig;
use crate::encoder::PassageEncoder;
use crate::error::{IndexError, Result};
use crate::ivf;
use crate::kmeans::KMeans;
use crate::manifest;
use crate::plan::IndexPlan;
use crate::sampler;

/// Builds one index directory from a collection and an encoder.
pub struct Indexer<'a, E: PassageEncoder + ?Sized> {
    config: IndexConfig,
    encoder: &'a E,
    backend: Box<dyn VectorBackend>,
}

impl<'a, E: PassageEncoder + ?Sized> Indexer<'a, E> {
    /// Validate the configuration and pick a kernel backend.
    pub fn new(config: IndexConfig, encoder: &'a E) -> Result<Self> {
        config.validate()?;
        if encoder.dim() != config.dim {
            return Err(IndexError::Config(format!(
                "encoder produces {}-dimensional embeddings but config says {}",
                encoder.dim(),
                config.dim
            )));
        }
        let backend = select_backend(&config);
        Ok(Self {
            config,
            encoder,
            backend,
        })
    }

    /// Run the full pipeline, returning the plan the index was built with.
    pub fn run(&self, collection: &Collection) -> Result<IndexPlan> {
        if collection.is_empty() {
            return Err(IndexError::Config("collection is empty".to_string()));
        }

        let index_path = self.config.index_path.clone();
        std::fs::create_dir_all(&index_path).map_err(IndexError::io("create", &index_path))?;

        let seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        info!(
            seed,
            num_documents = collection.len(),
            index_path = %index_path.display(),
            "starting index build"
        );
        let mut rng = StdRng::seed_from_u64(seed);

        let sample = sampler::draw_sample(
            collection,
            self.encoder,
            self.config.index_bsize,
            &mut rng,
        )?;

        let plan = IndexPlan::derive(
            collection.len(),
            sample.avg_doclen_est,
            sample.num_sampled_pids,
            self.config.chunksize,
            1,
        );
        info!(
            chunksize = plan.chunksize,
            num_chunks = plan.num_chunks,
            num_partitions = plan.num_partitions,
            num_embeddings_est = plan.num_embeddings_est,
            "planned index"
        );
        self.config.save(&index_path)?;
        plan.save(&index_path)?;

        let mut kmeans = KMeans::new(
            self.config.dim,
            plan.num_partitions,
            self.config.kmeans_niters,
        )?;
        kmeans.fit(&sample.training, &mut rng, self.backend.as_ref())?;
        let codec = ResidualCodec::calibrate(
            self.config.dim,
            self.config.nbits,
            kmeans.into_centroids(),
            &sample.heldout,
            self.backend.as_ref(),
        )?;
        codec.save(&index_path)?;
        info!(
            avg_residual = codec.avg_residual(),
            "trained centroids and residual codec"
        );

        chunk::encode_chunks(
            collection,
            self.encoder,
            &codec,
            self.backend.as_ref(),
            &plan,
            self.config.index_bsize,
            &index_path,
        )?;

        ivf::build(&index_path, plan.num_chunks, plan.num_partitions)?;

        let num_embeddings = manifest::finalize_offsets(&index_path, plan.num_chunks)?;
        manifest::check_complete(&index_path, plan.num_chunks)?;
        info!(num_embeddings, "index complete");

        Ok(plan)
    }
}
