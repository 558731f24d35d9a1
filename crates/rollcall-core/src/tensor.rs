//! Planar float image tensor consumed by the face models.
//!
//! Three `height × width` planes with samples in [0, 1]. Plane order is
//! B, G, R (reversed relative to the RGB source pixels); the detection,
//! landmark and embedding models are all fed this layout.

use image::RgbImage;
use ndarray::{Array3, ArrayView2, ArrayView3};
use thiserror::Error;

pub const BLUE: usize = 0;
pub const GREEN: usize = 1;
pub const RED: usize = 2;
pub const CHANNELS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("image has zero extent: {width}x{height}")]
    ZeroExtent { width: usize, height: usize },
    #[error("pixel buffer too short for {width}x{height} RGB: expected {expected} bytes, got {actual}")]
    ShortBuffer {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("expected {CHANNELS} planes, got {0}")]
    PlaneCount(usize),
}

/// Immutable planar tensor, shape `(3, height, width)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Array3<f32>,
}

impl Tensor {
    /// Convert a decoded RGB image, dividing every sample by 255.
    pub fn from_rgb_image(image: &RgbImage) -> Result<Self, TensorError> {
        Self::from_rgb8(image.as_raw(), image.width() as usize, image.height() as usize)
    }

    /// Convert a packed row-major RGB8 buffer.
    pub fn from_rgb8(pixels: &[u8], width: usize, height: usize) -> Result<Self, TensorError> {
        if width == 0 || height == 0 {
            return Err(TensorError::ZeroExtent { width, height });
        }
        let expected = width * height * CHANNELS;
        if pixels.len() < expected {
            return Err(TensorError::ShortBuffer {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        let mut data = Array3::<f32>::zeros((CHANNELS, height, width));
        for (i, px) in pixels[..expected].chunks_exact(CHANNELS).enumerate() {
            let (y, x) = (i / width, i % width);
            data[[RED, y, x]] = px[0] as f32 / 255.0;
            data[[GREEN, y, x]] = px[1] as f32 / 255.0;
            data[[BLUE, y, x]] = px[2] as f32 / 255.0;
        }

        Ok(Self { data })
    }

    /// Wrap planes already in the B, G, R layout.
    pub fn from_planes(data: Array3<f32>) -> Result<Self, TensorError> {
        let (c, h, w) = data.dim();
        if c != CHANNELS {
            return Err(TensorError::PlaneCount(c));
        }
        if w == 0 || h == 0 {
            return Err(TensorError::ZeroExtent { width: w, height: h });
        }
        Ok(Self { data })
    }

    /// Wrap planes the caller built with [`CHANNELS`] planes and a non-zero extent.
    pub(crate) fn from_shaped(data: Array3<f32>) -> Self {
        debug_assert!(data.dim().0 == CHANNELS && data.dim().1 > 0 && data.dim().2 > 0);
        Self { data }
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn planes(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn plane(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(ndarray::Axis(0), channel)
    }

    pub fn get(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[[channel, y, x]]
    }

    /// Bilinear sample at a fractional pixel position.
    ///
    /// Coordinates outside the image are clamped to the nearest edge pixel,
    /// so any finite position yields a value.
    pub fn sample_clamped(&self, channel: usize, x: f32, y: f32) -> f32 {
        let max_x = (self.width() - 1) as f32;
        let max_y = (self.height() - 1) as f32;
        let x = if x.is_finite() { x.clamp(0.0, max_x) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(0.0, max_y) } else { 0.0 };

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width() - 1);
        let y1 = (y0 + 1).min(self.height() - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let tl = self.data[[channel, y0, x0]];
        let tr = self.data[[channel, y0, x1]];
        let bl = self.data[[channel, y1, x0]];
        let br = self.data[[channel, y1, x1]];

        tl * (1.0 - fx) * (1.0 - fy) + tr * fx * (1.0 - fy) + bl * (1.0 - fx) * fy + br * fx * fy
    }

    /// Bilinear resize to `width × height` (both clamped to at least 1).
    pub fn resize(&self, width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let sx = self.width() as f32 / width as f32;
        let sy = self.height() as f32 / height as f32;

        let data = Array3::from_shape_fn((CHANNELS, height, width), |(c, y, x)| {
            let src_x = (x as f32 + 0.5) * sx - 0.5;
            let src_y = (y as f32 + 0.5) * sy - 0.5;
            self.sample_clamped(c, src_x, src_y)
        });

        Self::from_shaped(data)
    }
}
