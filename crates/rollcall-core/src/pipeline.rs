//! Image to embedding: tensor conversion, face location, alignment, extraction.

use crate::aligner::align_face;
use crate::engine::{EngineError, FaceEngine};
use crate::extractor::extract_embedding;
use crate::locator::locate_face;
use crate::tensor::{Tensor, TensorError};
use crate::types::{DimensionMismatch, Embedding};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid image: {0}")]
    InvalidImage(#[from] TensorError),
    #[error("image decode: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Dimension(#[from] DimensionMismatch),
    #[error("face engine: {0}")]
    Engine(#[from] EngineError),
}

/// Synchronous embedding pipeline over an injected [`FaceEngine`].
///
/// Holds no mutable state of its own; a shared engine makes the pipeline
/// shareable across threads.
pub struct EmbeddingPipeline<E> {
    engine: E,
}

impl<E: FaceEngine> EmbeddingPipeline<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Embedding of the most prominent face, or `None` when no face is found.
    pub fn try_generate_embedding(
        &self,
        image: &RgbImage,
    ) -> Result<Option<Embedding>, PipelineError> {
        let tensor = Tensor::from_rgb_image(image)?;
        self.try_generate_from_tensor(&tensor)
    }

    /// Same as [`try_generate_embedding`](Self::try_generate_embedding) on a prepared tensor.
    pub fn try_generate_from_tensor(
        &self,
        tensor: &Tensor,
    ) -> Result<Option<Embedding>, PipelineError> {
        let Some(face) = locate_face(&self.engine, tensor)? else {
            tracing::debug!(width = tensor.width(), height = tensor.height(), "no face found");
            return Ok(None);
        };

        let aligned = align_face(&self.engine, tensor, &face)?;
        let embedding = extract_embedding(&self.engine, &aligned)?;
        tracing::debug!(
            aligned_width = aligned.width(),
            aligned_height = aligned.height(),
            "embedding extracted"
        );
        Ok(Some(embedding))
    }

    /// Embedding of the most prominent face.
    ///
    /// When no face is found the result is [`Embedding::zeros`]; callers must
    /// check [`Embedding::is_zero`] before enrolling or matching it.
    pub fn generate_embedding(&self, image: &RgbImage) -> Result<Embedding, PipelineError> {
        Ok(self.try_generate_embedding(image)?.unwrap_or_else(Embedding::zeros))
    }

    /// Decode an encoded image (JPEG, PNG, ...) and run the pipeline.
    pub fn try_generate_embedding_from_bytes(
        &self,
        bytes: &[u8],
    ) -> Result<Option<Embedding>, PipelineError> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        self.try_generate_embedding(&image)
    }

    /// Zero-vector variant of
    /// [`try_generate_embedding_from_bytes`](Self::try_generate_embedding_from_bytes).
    pub fn generate_embedding_from_bytes(&self, bytes: &[u8]) -> Result<Embedding, PipelineError> {
        Ok(self
            .try_generate_embedding_from_bytes(bytes)?
            .unwrap_or_else(Embedding::zeros))
    }
}
