//! Pose correction: rotate the located face upright and crop it out.

use crate::engine::{EngineError, FaceEngine};
use crate::tensor::{Tensor, CHANNELS};
use crate::types::BoundingBox;
use ndarray::Array3;

/// Query landmarks inside `face` and return the upright face crop.
pub fn align_face<E: FaceEngine + ?Sized>(
    engine: &E,
    tensor: &Tensor,
    face: &BoundingBox,
) -> Result<Tensor, EngineError> {
    let landmarks = engine.landmarks(tensor, face)?;
    tracing::debug!(
        points = landmarks.points.len(),
        angle = landmarks.rotation_angle,
        "landmarks estimated"
    );
    Ok(rotate_crop(tensor, face, landmarks.rotation_angle))
}

/// Rotate `tensor` by `-angle_deg` about the box center and crop the box.
///
/// The output has the box's size, limited to the source extent. Every output
/// pixel maps back to a source position that is clamped to the image, so boxes
/// touching or crossing the border are sampled from the edge pixels.
pub fn rotate_crop(tensor: &Tensor, face: &BoundingBox, angle_deg: f32) -> Tensor {
    let out_w = (face.width.round() as usize).clamp(1, tensor.width());
    let out_h = (face.height.round() as usize).clamp(1, tensor.height());
    let (cx, cy) = face.center();

    let theta = angle_deg.to_radians();
    let (sin, cos) = if theta.is_finite() { theta.sin_cos() } else { (0.0, 1.0) };
    let half_w = out_w as f32 / 2.0;
    let half_h = out_h as f32 / 2.0;

    let data = Array3::from_shape_fn((CHANNELS, out_h, out_w), |(c, oy, ox)| {
        // Output pixel center relative to the crop center.
        let px = ox as f32 + 0.5 - half_w;
        let py = oy as f32 + 0.5 - half_h;
        // Undo the -angle rotation: the output's horizontal follows the tilted eye line.
        let sx = cos * px - sin * py + cx - 0.5;
        let sy = sin * px + cos * py + cy - 0.5;
        tensor.sample_clamped(c, sx, sy)
    });

    Tensor::from_shaped(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{GREEN, RED};
    use crate::testing::ScriptedEngine;
    use crate::types::LandmarkSet;

    /// 8x6 image whose red channel encodes the pixel index.
    fn gradient() -> Tensor {
        let (w, h) = (8usize, 6usize);
        let mut px = Vec::with_capacity(w * h * 3);
        for i in 0..w * h {
            px.extend_from_slice(&[(i * 5) as u8, 0, 0]);
        }
        Tensor::from_rgb8(&px, w, h).unwrap()
    }

    fn red_at(t: &Tensor, x: usize, y: usize) -> f32 {
        t.get(RED, y, x)
    }

    /// 41x41 black canvas with 3x3 blocks centered on each `(x, y, rgb)` spot.
    fn canvas_with_spots(spots: &[(usize, usize, [u8; 3])]) -> Tensor {
        let side = 41usize;
        let mut px = vec![0u8; side * side * 3];
        for &(cx, cy, rgb) in spots {
            for y in cy - 1..=cy + 1 {
                for x in cx - 1..=cx + 1 {
                    let i = (y * side + x) * 3;
                    px[i..i + 3].copy_from_slice(&rgb);
                }
            }
        }
        Tensor::from_rgb8(&px, side, side).unwrap()
    }

    /// Intensity-weighted center of `channel` over columns `cols`, as `(x, y)`.
    fn spot_center(t: &Tensor, channel: usize, cols: std::ops::Range<usize>) -> (f32, f32) {
        let (mut sx, mut sy, mut total) = (0.0, 0.0, 0.0);
        for y in 0..t.height() {
            for x in cols.clone() {
                let v = t.get(channel, y, x);
                sx += v * x as f32;
                sy += v * y as f32;
                total += v;
            }
        }
        assert!(total > 0.0, "no signal in channel {channel}");
        (sx / total, sy / total)
    }

    #[test]
    fn test_zero_angle_is_plain_crop() {
        let src = gradient();
        let face = BoundingBox::new(2.0, 1.0, 4.0, 3.0);
        let out = rotate_crop(&src, &face, 0.0);
        assert_eq!((out.width(), out.height()), (4, 3));
        for y in 0..3 {
            for x in 0..4 {
                assert!((red_at(&out, x, y) - red_at(&src, x + 2, y + 1)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_half_turn_mirrors_crop() {
        let src = gradient();
        let face = BoundingBox::new(2.0, 1.0, 4.0, 4.0);
        let out = rotate_crop(&src, &face, 180.0);
        for y in 0..4 {
            for x in 0..4 {
                let expected = red_at(&src, 2 + 3 - x, 1 + 3 - y);
                assert!((red_at(&out, x, y) - expected).abs() < 1e-3, "({x},{y})");
            }
        }
    }

    #[test]
    fn test_box_crossing_border_clamps() {
        let src = gradient();
        let face = BoundingBox::new(-3.0, -2.0, 5.0, 4.0);
        let out = rotate_crop(&src, &face, 30.0);
        assert_eq!((out.width(), out.height()), (5, 4));
        assert!(out.planes().iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
        // Top-left output pixel maps far outside; it reads the corner pixel.
        let corner = rotate_crop(&src, &face, 0.0);
        assert_eq!(red_at(&corner, 0, 0), red_at(&src, 0, 0));
    }

    #[test]
    fn test_oversized_box_limited_to_image() {
        let src = gradient();
        let face = BoundingBox::new(-100.0, -100.0, 1000.0, 1000.0);
        let out = rotate_crop(&src, &face, 0.0);
        assert_eq!((out.width(), out.height()), (8, 6));
    }

    #[test]
    fn test_tilted_eye_line_comes_out_level() {
        // Eyes on a 45 degree line, symmetric about the canvas center (20.5, 20.5).
        let src = canvas_with_spots(&[(14, 14, [255, 0, 0]), (26, 26, [255, 0, 0])]);
        let landmarks = LandmarkSet::from_points(vec![
            (14.5, 14.5),
            (26.5, 26.5),
            (20.5, 22.0),
            (17.0, 26.0),
            (24.0, 26.0),
        ]);
        assert!((landmarks.rotation_angle - 45.0).abs() < 1e-4);

        let face = BoundingBox::new(0.0, 0.0, 41.0, 41.0);
        let out = rotate_crop(&src, &face, landmarks.rotation_angle);

        let (lx, ly) = spot_center(&out, RED, 0..20);
        let (rx, ry) = spot_center(&out, RED, 21..41);
        assert!((ly - ry).abs() < 0.5, "eyes on rows {ly} and {ry}");
        assert!((ly - 20.0).abs() < 0.5, "eye row {ly} is off center");
        assert!((lx - 11.5).abs() < 0.5, "left eye at column {lx}");
        assert!((rx - 28.5).abs() < 0.5, "right eye at column {rx}");
    }

    #[test]
    fn test_left_eye_maps_to_left_column() {
        // Left eye (red) straight above the right eye (green): a 90 degree eye line.
        let src = canvas_with_spots(&[(20, 12, [255, 0, 0]), (20, 28, [0, 255, 0])]);
        let landmarks = LandmarkSet::from_points(vec![
            (20.5, 12.5),
            (20.5, 28.5),
            (15.0, 20.5),
            (11.0, 16.0),
            (11.0, 24.0),
        ]);
        assert!((landmarks.rotation_angle - 90.0).abs() < 1e-4);

        let face = BoundingBox::new(0.0, 0.0, 41.0, 41.0);
        let out = rotate_crop(&src, &face, landmarks.rotation_angle);

        let (lx, ly) = spot_center(&out, RED, 0..41);
        let (rx, ry) = spot_center(&out, GREEN, 0..41);
        assert!((lx - 12.0).abs() < 0.1 && (ly - 20.0).abs() < 0.1, "left eye at ({lx}, {ly})");
        assert!((rx - 28.0).abs() < 0.1 && (ry - 20.0).abs() < 0.1, "right eye at ({rx}, {ry})");
    }

    #[test]
    fn test_degenerate_box_yields_single_pixel_crop() {
        let src = gradient();
        let out = rotate_crop(&src, &BoundingBox::new(3.0, 2.0, 0.2, 0.2), 0.0);
        assert_eq!((out.width(), out.height()), (1, 1));
    }

    #[test]
    fn test_align_uses_landmark_angle() {
        let src = gradient();
        let face = BoundingBox::new(2.0, 1.0, 4.0, 4.0);
        let engine =
            ScriptedEngine::default().with_landmarks(LandmarkSet::with_angle(vec![], 180.0));
        let aligned = align_face(&engine, &src, &face).unwrap();
        assert_eq!(aligned, rotate_crop(&src, &face, 180.0));
    }
}
