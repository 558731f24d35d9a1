//! 68-point facial landmark regressor (PFLD-style).
//!
//! Crops the detected box, resizes it to 112×112 and reads back 136
//! coordinates normalized to the crop.

use crate::{load_session, OnnxError};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use parking_lot::Mutex;
use rollcall_core::aligner::rotate_crop;
use rollcall_core::{BoundingBox, LandmarkSet, Tensor};
use std::path::Path;

const LANDMARK_INPUT_SIZE: usize = 112;
const LANDMARK_POINTS: usize = 68;

pub struct LandmarkRegressor {
    session: Mutex<Session>,
}

impl LandmarkRegressor {
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, OnnxError> {
        let session = load_session(model_path, intra_threads, "landmarks-68")?;
        Ok(Self { session: Mutex::new(session) })
    }

    /// Landmarks for `face`, in `tensor` coordinates, with the eye-line angle.
    pub fn landmarks(&self, tensor: &Tensor, face: &BoundingBox) -> Result<LandmarkSet, OnnxError> {
        let crop = rotate_crop(tensor, face, 0.0);
        let input = preprocess(&crop);

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OnnxError::InferenceFailed(format!("landmark extraction: {e}")))?;

        let points = to_image_points(raw, face, crop.width(), crop.height())?;
        Ok(LandmarkSet::from_points(points))
    }
}

/// Crop to NCHW at 112×112, samples kept in [0, 1].
fn preprocess(crop: &Tensor) -> Array4<f32> {
    let resized = crop.resize(LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE);
    resized.planes().insert_axis(ndarray::Axis(0)).to_owned()
}

/// Map crop-normalized (x, y) pairs back into source coordinates.
///
/// The crop is centered on the box; its size may be smaller than the box when
/// the box exceeds the image.
fn to_image_points(
    raw: &[f32],
    face: &BoundingBox,
    crop_w: usize,
    crop_h: usize,
) -> Result<Vec<(f32, f32)>, OnnxError> {
    if raw.len() < LANDMARK_POINTS * 2 {
        return Err(OnnxError::InferenceFailed(format!(
            "expected {} landmark coordinates, got {}",
            LANDMARK_POINTS * 2,
            raw.len()
        )));
    }

    let (cx, cy) = face.center();
    let (w, h) = (crop_w as f32, crop_h as f32);
    let origin = (cx - w / 2.0, cy - h / 2.0);

    Ok(raw[..LANDMARK_POINTS * 2]
        .chunks_exact(2)
        .map(|p| (origin.0 + p[0] * w, origin.1 + p[1] * h))
        .collect())
}
