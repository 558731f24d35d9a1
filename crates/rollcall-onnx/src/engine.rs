use crate::detector::ScrfdDetector;
use crate::embedder::ArcFaceEmbedder;
use crate::landmarks::LandmarkRegressor;
use crate::OnnxError;
use rollcall_core::{BoundingBox, Detection, EngineError, FaceEngine, LandmarkSet, Tensor};
use std::path::{Path, PathBuf};

pub const DEFAULT_DETECTOR_MODEL: &str = "det_10g.onnx";
pub const DEFAULT_LANDMARK_MODEL: &str = "landmarks_68_pfld.onnx";
pub const DEFAULT_EMBEDDING_MODEL: &str = "w600k_r50.onnx";

/// Locations of the three model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub landmarks: PathBuf,
    pub embedder: PathBuf,
}

impl ModelPaths {
    /// Default file names inside `model_dir`.
    pub fn in_dir(model_dir: &Path) -> Self {
        Self {
            detector: model_dir.join(DEFAULT_DETECTOR_MODEL),
            landmarks: model_dir.join(DEFAULT_LANDMARK_MODEL),
            embedder: model_dir.join(DEFAULT_EMBEDDING_MODEL),
        }
    }
}

/// All three models, each session behind its own lock so one engine can
/// serve several pipelines.
pub struct OnnxEngine {
    detector: ScrfdDetector,
    landmarks: LandmarkRegressor,
    embedder: ArcFaceEmbedder,
}

impl OnnxEngine {
    /// Load every model, failing fast on the first missing or invalid file.
    pub fn load(paths: &ModelPaths, intra_threads: usize) -> Result<Self, OnnxError> {
        let detector = ScrfdDetector::load(&paths.detector, intra_threads)?;
        let landmarks = LandmarkRegressor::load(&paths.landmarks, intra_threads)?;
        let embedder = ArcFaceEmbedder::load(&paths.embedder, intra_threads)?;
        tracing::info!(intra_threads, "face engine ready");
        Ok(Self { detector, landmarks, embedder })
    }
}

impl FaceEngine for OnnxEngine {
    fn detect(&self, tensor: &Tensor) -> Result<Vec<Detection>, EngineError> {
        Ok(self.detector.detect(tensor)?)
    }

    fn landmarks(&self, tensor: &Tensor, face: &BoundingBox) -> Result<LandmarkSet, EngineError> {
        Ok(self.landmarks.landmarks(tensor, face)?)
    }

    fn embed(&self, aligned: &Tensor) -> Result<Vec<f32>, EngineError> {
        Ok(self.embedder.embed(aligned)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths_in_dir() {
        let paths = ModelPaths::in_dir(Path::new("/opt/models"));
        assert_eq!(paths.detector, PathBuf::from("/opt/models/det_10g.onnx"));
        assert_eq!(paths.embedder, PathBuf::from("/opt/models/w600k_r50.onnx"));
    }

    #[test]
    fn test_missing_model_fails_fast() {
        let paths = ModelPaths::in_dir(Path::new("/nonexistent/rollcall-models"));
        let err = OnnxEngine::load(&paths, 1).err().unwrap();
        assert!(matches!(err, OnnxError::ModelNotFound(ref p) if p.ends_with("det_10g.onnx")));
        assert!(matches!(EngineError::from(err), EngineError::ModelNotFound(_)));
    }
}
