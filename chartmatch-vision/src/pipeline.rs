use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::{session::Session, value::Value};

use crate::embedding::Embedding;
use crate::preprocess::{self, PreprocessConfig};

/// Full pipeline: preprocess → encode → pool
pub struct Pipeline {
    pub encoder: Session,
    pub preprocess: PreprocessConfig,
}

impl Pipeline {
    pub fn new(model_path: &Path, preprocess: PreprocessConfig) -> Result<Self> {
        Ok(Self {
            encoder: crate::model::encoder_session(model_path)?,
            preprocess,
        })
    }

    /// Run the encoder on a decoded image and return its pooled feature vector
    pub fn extract_embedding(&mut self, img: &DynamicImage) -> Result<Embedding> {
        let input = preprocess::to_input_tensor(img, &self.preprocess)
            .context("preparing model input")?;
        let input_tensor = Value::from_array(input)?;

        let outputs = self
            .encoder
            .run(ort::inputs![input_tensor])
            .context("running encoder")?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let shape_vec: Vec<i64> = shape.iter().copied().collect();

        let features = preprocess::pool_features(&shape_vec, data, self.preprocess.layout)
            .context("pooling encoder output")?;
        anyhow::ensure!(!features.is_empty(), "encoder produced an empty feature vector");

        log::debug!(
            "Encoder output {:?} pooled to {} features",
            shape_vec,
            features.len()
        );

        Ok(Embedding::new(features))
    }
}
