use serde::{Deserialize, Serialize};
use std::ops::Deref;
use thiserror::Error;

/// Length of every face embedding produced or accepted by this crate.
pub const EMBEDDING_DIM: usize = 512;

/// Landmark indices of the eye contours in the 68-point (iBUG 300-W) layout.
const LEFT_EYE_68: std::ops::Range<usize> = 36..42;
const RIGHT_EYE_68: std::ops::Range<usize> = 42..48;

/// A vector whose length differs from the expected fixed dimension.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("dimension mismatch: expected {expected}, got {actual}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub actual: usize,
}

impl DimensionMismatch {
    /// `Ok(())` when `actual == expected`.
    pub fn check(expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self { expected, actual })
        }
    }
}

/// Axis-aligned face region in tensor pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// A degenerate box: zero or negative area, or non-finite coordinates.
    pub fn is_empty(&self) -> bool {
        let finite = self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite();
        !finite || self.width <= 0.0 || self.height <= 0.0
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// One candidate returned by a detection model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
}

/// Facial landmarks plus the in-plane rotation they imply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub points: Vec<(f32, f32)>,
    /// Angle of the eye line against the horizontal, in degrees. Positive when
    /// the right eye sits lower than the left one (image y grows downward).
    pub rotation_angle: f32,
}

impl LandmarkSet {
    /// Landmarks whose rotation angle was supplied by the model.
    pub fn with_angle(points: Vec<(f32, f32)>, rotation_angle: f32) -> Self {
        Self { points, rotation_angle }
    }

    /// Landmarks with the rotation angle derived from the eye positions.
    ///
    /// Understands the 68-point layout (eye contour centroids) and the
    /// five-point layout (left eye, right eye, nose, mouth corners). Any other
    /// layout yields an angle of zero.
    pub fn from_points(points: Vec<(f32, f32)>) -> Self {
        let rotation_angle = match points.len() {
            68 => eye_line_angle(
                centroid(&points[LEFT_EYE_68]),
                centroid(&points[RIGHT_EYE_68]),
            ),
            5 => eye_line_angle(points[0], points[1]),
            _ => 0.0,
        };
        Self { points, rotation_angle }
    }
}

fn centroid(points: &[(f32, f32)]) -> (f32, f32) {
    let n = points.len().max(1) as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

fn eye_line_angle(left: (f32, f32), right: (f32, f32)) -> f32 {
    (right.1 - left.1).atan2(right.0 - left.0).to_degrees()
}

/// Fixed-length face embedding.
///
/// Always exactly [`EMBEDDING_DIM`] components; construction through
/// [`TryFrom`] or deserialization rejects any other length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// The all-zero vector, standing in for "no face found".
    pub fn zeros() -> Self {
        Self { values: vec![0.0; EMBEDDING_DIM] }
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Cosine similarity in [-1, 1]; 0.0 when either vector has zero magnitude.
    pub fn similarity(&self, other: &[f32]) -> f32 {
        cosine_similarity(&self.values, other)
    }

    /// Flat little-endian f32 buffer, no header.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        crate::codec::encode(&self.values)
    }

    /// Inverse of [`to_le_bytes`](Self::to_le_bytes).
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, DimensionMismatch> {
        let values = crate::codec::decode(bytes, EMBEDDING_DIM)?;
        Ok(Self { values })
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = DimensionMismatch;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        DimensionMismatch::check(EMBEDDING_DIM, values.len())?;
        Ok(Self { values })
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.values
    }
}

impl Deref for Embedding {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.values
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.values
    }
}

/// Cosine similarity between two equally long slices.
///
/// Accumulates over every component before dividing; a zero denominator
/// yields 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 { dot / denom } else { 0.0 }
}

/// Best match for a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub label: String,
    /// Cosine similarity of the best record, or [`MatchResult::NO_MATCH_SCORE`].
    pub score: f32,
}

impl MatchResult {
    /// Score reported when nothing could be compared.
    pub const NO_MATCH_SCORE: f32 = -1.0;

    /// The "no match" sentinel: empty label, score -1.
    pub fn no_match() -> Self {
        Self { label: String::new(), score: Self::NO_MATCH_SCORE }
    }

    pub fn is_no_match(&self) -> bool {
        self.label.is_empty() && self.score == Self::NO_MATCH_SCORE
    }

    /// Whether the match clears a caller-chosen acceptance threshold.
    pub fn accepted(&self, threshold: f32) -> bool {
        !self.is_no_match() && self.score >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_rejects_wrong_length() {
        let err = Embedding::try_from(vec![1.0; 511]).unwrap_err();
        assert_eq!(err, DimensionMismatch { expected: 512, actual: 511 });
        assert!(Embedding::try_from(vec![1.0; 513]).is_err());
        assert!(Embedding::try_from(unit(3)).is_ok());
    }

    #[test]
    fn test_zeros_is_zero() {
        let z = Embedding::zeros();
        assert_eq!(z.len(), EMBEDDING_DIM);
        assert!(z.is_zero());
        assert!(!Embedding::try_from(unit(0)).unwrap().is_zero());
    }

    #[test]
    fn test_embedding_deserialize_validates_length() {
        let short = serde_json::to_string(&vec![0.5f32; 10]).unwrap();
        assert!(serde_json::from_str::<Embedding>(&short).is_err());

        let ok = serde_json::to_string(&unit(7)).unwrap();
        let e: Embedding = serde_json::from_str(&ok).unwrap();
        assert_eq!(e[7], 1.0);
    }

    #[test]
    fn test_bbox_empty() {
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(BoundingBox::new(0.0, 0.0, 10.0, -1.0).is_empty());
        assert!(BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0).is_empty());
        assert!(!BoundingBox::new(5.0, 5.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_landmark_angle_level_eyes() {
        let lm = LandmarkSet::from_points(vec![
            (10.0, 20.0),
            (30.0, 20.0),
            (20.0, 30.0),
            (12.0, 40.0),
            (28.0, 40.0),
        ]);
        assert!(lm.rotation_angle.abs() < 1e-5);
    }

    #[test]
    fn test_landmark_angle_68_tilted() {
        let mut points = vec![(0.0f32, 0.0f32); 68];
        for p in &mut points[36..42] {
            *p = (10.0, 10.0);
        }
        for p in &mut points[42..48] {
            *p = (20.0, 20.0);
        }
        let lm = LandmarkSet::from_points(points);
        assert!((lm.rotation_angle - 45.0).abs() < 1e-4, "angle = {}", lm.rotation_angle);
    }

    #[test]
    fn test_landmark_angle_unknown_layout() {
        let lm = LandmarkSet::from_points(vec![(1.0, 2.0); 3]);
        assert_eq!(lm.rotation_angle, 0.0);
    }

    #[test]
    fn test_match_result_sentinel() {
        let none = MatchResult::no_match();
        assert!(none.is_no_match());
        assert!(!none.accepted(-1.0));

        let hit = MatchResult { label: "alice".into(), score: 0.8 };
        assert!(!hit.is_no_match());
        assert!(hit.accepted(0.4));
        assert!(!hit.accepted(0.9));
    }
}
