//! rollcall-onnx — ONNX Runtime implementation of [`rollcall_core::FaceEngine`].
//!
//! SCRFD finds faces, a PFLD-style regressor places 68 landmarks, and an
//! ArcFace model turns the aligned crop into a 512-dimensional embedding.

pub mod detector;
pub mod embedder;
pub mod engine;
pub mod landmarks;

pub use engine::{ModelPaths, OnnxEngine};

use rollcall_core::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OnnxError {
    #[error("model file not found: {0}; download the ONNX model and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl From<OnnxError> for EngineError {
    fn from(err: OnnxError) -> Self {
        match err {
            OnnxError::ModelNotFound(path) => EngineError::ModelNotFound(path),
            OnnxError::InferenceFailed(msg) => EngineError::InferenceFailed(msg),
            OnnxError::Ort(e) => EngineError::backend(e),
        }
    }
}

/// Open an ONNX session, failing early with a readable error when the file is missing.
pub(crate) fn load_session(
    model_path: &std::path::Path,
    intra_threads: usize,
    kind: &str,
) -> Result<ort::session::Session, OnnxError> {
    if !model_path.exists() {
        return Err(OnnxError::ModelNotFound(model_path.display().to_string()));
    }

    let session = ort::session::Session::builder()?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)?;

    tracing::info!(
        path = %model_path.display(),
        kind,
        inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded ONNX model"
    );

    Ok(session)
}
