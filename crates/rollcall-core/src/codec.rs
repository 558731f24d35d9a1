//! At-rest vector format: contiguous little-endian f32, no header.

use crate::types::DimensionMismatch;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Encode a float slice as a flat little-endian buffer.
pub fn encode(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * F32_BYTES);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Decode a flat little-endian buffer holding exactly `dim` floats.
///
/// A trailing partial float counts as one extra component in the reported
/// mismatch.
pub fn decode(bytes: &[u8], dim: usize) -> Result<Vec<f32>, DimensionMismatch> {
    if bytes.len() != dim * F32_BYTES {
        return Err(DimensionMismatch {
            expected: dim,
            actual: bytes.len().div_ceil(F32_BYTES),
        });
    }

    Ok(bytes
        .chunks_exact(F32_BYTES)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
