//! Final stage: aligned face crop to embedding.

use crate::engine::FaceEngine;
use crate::pipeline::PipelineError;
use crate::tensor::Tensor;
use crate::types::Embedding;

/// Run the embedding model on an aligned crop.
///
/// The model output is taken as-is (no re-normalization); only its length is
/// checked.
pub fn extract_embedding<E: FaceEngine + ?Sized>(
    engine: &E,
    aligned: &Tensor,
) -> Result<Embedding, PipelineError> {
    let raw = engine.embed(aligned)?;
    let embedding = Embedding::try_from(raw)?;
    Ok(embedding)
}
