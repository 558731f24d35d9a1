//! Selects the face the rest of the pipeline works on.

use crate::engine::{EngineError, FaceEngine};
use crate::tensor::Tensor;
use crate::types::BoundingBox;

/// Run the detection model and keep its top-ranked candidate.
///
/// Returns `None` when the model finds nothing or its first candidate is a
/// degenerate box. No re-ranking happens here: the model's order is trusted.
pub fn locate_face<E: FaceEngine + ?Sized>(
    engine: &E,
    tensor: &Tensor,
) -> Result<Option<BoundingBox>, EngineError> {
    let candidates = engine.detect(tensor)?;

    let Some(first) = candidates.first() else {
        tracing::debug!("detector returned no candidates");
        return Ok(None);
    };

    if first.bbox.is_empty() {
        tracing::debug!(bbox = ?first.bbox, "top candidate is empty");
        return Ok(None);
    }

    tracing::debug!(
        candidates = candidates.len(),
        score = first.score,
        bbox = ?first.bbox,
        "face located"
    );
    Ok(Some(first.bbox))
}
