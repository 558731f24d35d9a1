//! ArcFace embedder.
//!
//! Produces a 512-dimensional embedding from an aligned face crop, using the
//! w600k_r50 model. The raw model output is returned unnormalized.

use crate::{load_session, OnnxError};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use parking_lot::Mutex;
use rollcall_core::Tensor;
use std::path::Path;

const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric normalization, unlike SCRFD's 128.0

pub struct ArcFaceEmbedder {
    session: Mutex<Session>,
}

impl ArcFaceEmbedder {
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, OnnxError> {
        let session = load_session(model_path, intra_threads, "arcface")?;
        Ok(Self { session: Mutex::new(session) })
    }

    pub fn embed(&self, aligned: &Tensor) -> Result<Vec<f32>, OnnxError> {
        let input = preprocess(aligned);

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OnnxError::InferenceFailed(format!("embedding extraction: {e}")))?;

        Ok(raw.to_vec())
    }
}

/// Resize to 112×112 and normalize each plane to roughly [-1, 1].
fn preprocess(aligned: &Tensor) -> Array4<f32> {
    let resized = aligned.resize(ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE);
    resized
        .planes()
        .insert_axis(ndarray::Axis(0))
        .mapv(|v| (v * 255.0 - ARCFACE_MEAN) / ARCFACE_STD)
}
