//! The face-model capability the pipeline delegates to.
//!
//! Detection, landmark regression and embedding are black boxes owned by an
//! engine implementation (ONNX Runtime in production, a deterministic stub in
//! tests). The pipeline only owns what happens between the calls.

use crate::tensor::Tensor;
use crate::types::{BoundingBox, Detection, LandmarkSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("model backend: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Detection, landmark and embedding models behind one interface.
pub trait FaceEngine {
    /// Candidate faces, best first by the model's own ranking.
    fn detect(&self, tensor: &Tensor) -> Result<Vec<Detection>, EngineError>;

    /// Landmarks inside `face`, in `tensor` pixel coordinates.
    fn landmarks(&self, tensor: &Tensor, face: &BoundingBox) -> Result<LandmarkSet, EngineError>;

    /// Raw embedding of an aligned face crop.
    fn embed(&self, aligned: &Tensor) -> Result<Vec<f32>, EngineError>;
}

impl<E: FaceEngine + ?Sized> FaceEngine for Arc<E> {
    fn detect(&self, tensor: &Tensor) -> Result<Vec<Detection>, EngineError> {
        (**self).detect(tensor)
    }

    fn landmarks(&self, tensor: &Tensor, face: &BoundingBox) -> Result<LandmarkSet, EngineError> {
        (**self).landmarks(tensor, face)
    }

    fn embed(&self, aligned: &Tensor) -> Result<Vec<f32>, EngineError> {
        (**self).embed(aligned)
    }
}

impl<E: FaceEngine + ?Sized> FaceEngine for &E {
    fn detect(&self, tensor: &Tensor) -> Result<Vec<Detection>, EngineError> {
        (**self).detect(tensor)
    }

    fn landmarks(&self, tensor: &Tensor, face: &BoundingBox) -> Result<LandmarkSet, EngineError> {
        (**self).landmarks(tensor, face)
    }

    fn embed(&self, aligned: &Tensor) -> Result<Vec<f32>, EngineError> {
        (**self).embed(aligned)
    }
}
