//! Instance mask decoding.
//!
//! Soft masks arrive as fixed-size square patches. Each patch is resized
//! bilinearly to the detection's pixel extent and thresholded.

use crate::detection::Mask;
use crate::geometry::CornerBox;
use crate::util::{DetPostError, DetPostResult};
use half::f16;

/// Pixel extent a mask for `bbox` must cover: `(x1 - x0 + 1, y1 - y0 + 1)`.
pub fn mask_extent(bbox: &CornerBox) -> DetPostResult<(usize, usize)> {
    let width = (bbox.x1 - bbox.x0 + 1.0) as i64;
    let height = (bbox.y1 - bbox.y0 + 1.0) as i64;
    if width < 1 || height < 1 {
        return Err(DetPostError::InvalidBox { width, height });
    }
    Ok((width as usize, height as usize))
}

/// Resizes a soft mask patch to `target_width x target_height` and binarizes it.
///
/// A cell is set when the interpolated value is strictly above `threshold`.
pub fn decode_mask(
    patch: &[f32],
    patch_width: usize,
    patch_height: usize,
    target_width: i64,
    target_height: i64,
    threshold: f32,
) -> DetPostResult<Mask> {
    if target_width < 1 || target_height < 1 {
        return Err(DetPostError::InvalidBox {
            width: target_width,
            height: target_height,
        });
    }
    if patch_width == 0 || patch_height == 0 {
        return Err(DetPostError::InvalidParam {
            reason: "mask patch must be non-empty",
        });
    }
    let needed = patch_width
        .checked_mul(patch_height)
        .ok_or(DetPostError::InvalidParam {
            reason: "mask patch size overflows usize",
        })?;
    if patch.len() < needed {
        return Err(DetPostError::BufferTooSmall {
            needed,
            got: patch.len(),
        });
    }

    let dst_w = target_width as usize;
    let dst_h = target_height as usize;
    let scale_x = patch_width as f32 / dst_w as f32;
    let scale_y = patch_height as f32 / dst_h as f32;
    let max_x = (patch_width - 1) as f32;
    let max_y = (patch_height - 1) as f32;

    let cell_count = dst_w.checked_mul(dst_h).ok_or(DetPostError::InvalidBox {
        width: target_width,
        height: target_height,
    })?;
    let mut cells = Vec::with_capacity(cell_count);
    for y in 0..dst_h {
        let src_y = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, max_y);
        let y0 = src_y.floor() as usize;
        let y1 = (y0 + 1).min(patch_height - 1);
        let wy = src_y - y0 as f32;
        for x in 0..dst_w {
            let src_x = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, max_x);
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(patch_width - 1);
            let wx = src_x - x0 as f32;

            let p00 = patch[y0 * patch_width + x0];
            let p10 = patch[y0 * patch_width + x1];
            let p01 = patch[y1 * patch_width + x0];
            let p11 = patch[y1 * patch_width + x1];
            let top = p00 + (p10 - p00) * wx;
            let bottom = p01 + (p11 - p01) * wx;
            let value = top + (bottom - top) * wy;
            cells.push(value > threshold);
        }
    }
    Ok(Mask::from_parts(dst_w, dst_h, cells))
}

/// Half-float variant of [`decode_mask`] for square patches.
pub fn decode_mask_f16(
    patch: &[f16],
    mask_size: usize,
    target_width: i64,
    target_height: i64,
    threshold: f32,
) -> DetPostResult<Mask> {
    let needed = mask_size
        .checked_mul(mask_size)
        .ok_or(DetPostError::InvalidParam {
            reason: "mask patch size overflows usize",
        })?;
    let values = patch.get(..needed).ok_or(DetPostError::BufferTooSmall {
        needed,
        got: patch.len(),
    })?;
    let widened: Vec<f32> = values.iter().map(|v| v.to_f32()).collect();
    decode_mask(
        &widened,
        mask_size,
        mask_size,
        target_width,
        target_height,
        threshold,
    )
}
