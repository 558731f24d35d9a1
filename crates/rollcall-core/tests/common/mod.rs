use image::{Rgb, RgbImage};
use rollcall_core::tensor::RED;
use rollcall_core::{
    BoundingBox, Detection, EngineError, FaceEngine, LandmarkSet, Tensor, EMBEDDING_DIM,
};

/// Treats the bounding box of bright-red pixels as "the face" and embeds the
/// aligned crop by sampling it on a coarse grid.
pub struct BrightSpotEngine;

const GRID: usize = 8;

impl FaceEngine for BrightSpotEngine {
    fn detect(&self, tensor: &Tensor) -> Result<Vec<Detection>, EngineError> {
        let red = tensor.plane(RED);
        let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0usize, 0usize);
        for ((y, x), &v) in red.indexed_iter() {
            if v > 0.5 {
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x + 1);
                y1 = y1.max(y + 1);
            }
        }
        if x0 == usize::MAX {
            return Ok(Vec::new());
        }
        Ok(vec![Detection {
            bbox: BoundingBox::new(x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32),
            score: 0.99,
        }])
    }

    fn landmarks(&self, _: &Tensor, face: &BoundingBox) -> Result<LandmarkSet, EngineError> {
        let (cx, cy) = face.center();
        let dx = face.width / 4.0;
        let dy = face.height / 4.0;
        Ok(LandmarkSet::from_points(vec![
            (cx - dx, cy - dy),
            (cx + dx, cy - dy),
            (cx, cy),
            (cx - dx, cy + dy),
            (cx + dx, cy + dy),
        ]))
    }

    fn embed(&self, aligned: &Tensor) -> Result<Vec<f32>, EngineError> {
        let small = aligned.resize(GRID, GRID);
        Ok((0..EMBEDDING_DIM)
            .map(|i| {
                let c = i % 3;
                let y = (i / 3) % GRID;
                let x = (i / (3 * GRID)) % GRID;
                small.get(c, y, x) + 0.01
            })
            .collect())
    }
}

/// 64x64 dark canvas with a bright-red face patch whose interior pattern is
/// controlled by `stripe`.
pub fn face_image(stripe: Rgb<u8>, vertical: bool) -> RgbImage {
    RgbImage::from_fn(64, 64, |x, y| {
        let inside = (16..48).contains(&x) && (16..48).contains(&y);
        if !inside {
            return Rgb([10, 10, 10]);
        }
        let on_stripe = if vertical { (28..36).contains(&x) } else { (28..36).contains(&y) };
        if on_stripe {
            Rgb([255, stripe[1], stripe[2]])
        } else {
            Rgb([230, 40, 40])
        }
    })
}
