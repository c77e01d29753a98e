//! Image → embedding capability.
//!
//! [`ImageEmbedder`] is the seam between matching and the model: the index
//! builder and the match engine only see this trait, so tests can plug in a
//! deterministic fake. [`OnnxEmbedder`] is the production implementation.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::config::ModelConfig;
use crate::{Embedding, Pipeline};

/// Produces a fixed-length embedding for the image stored at `path`.
///
/// Implementations must be deterministic for a given image and model
/// version. Calls are synchronous; async callers should go through
/// `tokio::task::spawn_blocking`.
pub trait ImageEmbedder: Send + Sync {
    fn embed(&self, path: &Path) -> Result<Embedding>;
}

/// ONNX Runtime backed embedder.
///
/// The session needs exclusive access to run, so inference is serialized
/// behind a mutex.
pub struct OnnxEmbedder {
    pipeline: Mutex<Pipeline>,
}

impl OnnxEmbedder {
    pub fn new(cfg: &ModelConfig) -> Result<Self> {
        let pipeline = Pipeline::new(&cfg.path, cfg.preprocess())
            .context("Failed to initialize feature extraction pipeline")?;
        Ok(Self {
            pipeline: Mutex::new(pipeline),
        })
    }
}

impl ImageEmbedder for OnnxEmbedder {
    fn embed(&self, path: &Path) -> Result<Embedding> {
        let img = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
        let mut pipeline = self
            .pipeline
            .lock()
            .map_err(|_| anyhow::anyhow!("encoder session lock poisoned"))?;
        pipeline
            .extract_embedding(&img)
            .with_context(|| format!("extracting features from {}", path.display()))
    }
}
