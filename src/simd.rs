//! SIMD union IoU for the suppression sweep (feature `simd`).
//!
//! Intersections and unions are computed eight candidates at a time with
//! `wide::f32x8`; the sanity, overlap and epsilon checks then run per lane so
//! results match the scalar path exactly.

use crate::geometry::iou::{extent_iou, Extent, IouMethod};
use crate::util::math::is_near_zero;
use wide::f32x8;

const LANES: usize = 8;

/// Union IoU of `keeper` against every extent in `tail`, written to `out`.
pub(crate) fn union_overlaps(keeper: &Extent, tail: &[Extent], out: &mut Vec<f32>) {
    out.clear();
    out.reserve(tail.len());

    let k_left = f32x8::splat(keeper.left);
    let k_top = f32x8::splat(keeper.top);
    let k_right = f32x8::splat(keeper.right);
    let k_bottom = f32x8::splat(keeper.bottom);
    let k_area = f32x8::splat(keeper.area);

    let mut chunks = tail.chunks_exact(LANES);
    for chunk in &mut chunks {
        let lane = |f: fn(&Extent) -> f32| {
            let mut buf = [0.0f32; LANES];
            for (slot, ext) in buf.iter_mut().zip(chunk) {
                *slot = f(ext);
            }
            f32x8::from(buf)
        };
        let left = k_left.max(lane(|e| e.left));
        let right = k_right.min(lane(|e| e.right));
        let top = k_top.max(lane(|e| e.top));
        let bottom = k_bottom.min(lane(|e| e.bottom));
        let inter = (right - left) * (bottom - top);
        let union = (k_area + lane(|e| e.area)) - inter;

        let left = left.to_array();
        let right = right.to_array();
        let top = top.to_array();
        let bottom = bottom.to_array();
        let inter = inter.to_array();
        let union = union.to_array();
        for (i, other) in chunk.iter().enumerate() {
            let disjoint = top[i] > bottom[i] || left[i] > right[i];
            let value = if !keeper.sane || !other.sane || disjoint || is_near_zero(union[i]) {
                0.0
            } else {
                inter[i] / union[i]
            };
            out.push(value);
        }
    }

    for other in chunks.remainder() {
        out.push(extent_iou(keeper, other, IouMethod::Union));
    }
}
