//! Intersection and IoU variants.
//!
//! Degenerate inputs are not errors: a box that fails [`BoxGeometry::is_sane`]
//! or a pair that does not overlap yields `None` / `0.0`.

use crate::geometry::BoxGeometry;
use crate::util::math::is_near_zero;

/// Denominator used to turn an intersection into an overlap ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IouMethod {
    /// Intersection over union.
    #[default]
    Union,
    /// Intersection over the smaller area.
    Min,
    /// Intersection over the larger area.
    Max,
    /// Union IoU minus the normalized squared center distance.
    Diou,
}

/// Flattened box used by the IoU kernels.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Extent {
    pub(crate) left: f32,
    pub(crate) top: f32,
    pub(crate) right: f32,
    pub(crate) bottom: f32,
    pub(crate) cx: f32,
    pub(crate) cy: f32,
    pub(crate) area: f32,
    pub(crate) sane: bool,
}

impl Extent {
    pub(crate) fn of<B: BoxGeometry + ?Sized>(b: &B) -> Self {
        let corners = b.corners();
        let center = b.center();
        Self {
            left: corners.x0,
            top: corners.y0,
            right: corners.x1,
            bottom: corners.y1,
            cx: center.x,
            cy: center.y,
            area: b.area(),
            sane: b.is_sane(),
        }
    }
}

pub(crate) fn extent_intersection(a: &Extent, b: &Extent) -> Option<f32> {
    if !a.sane || !b.sane {
        return None;
    }
    let left = a.left.max(b.left);
    let right = a.right.min(b.right);
    let top = a.top.max(b.top);
    let bottom = a.bottom.min(b.bottom);
    if top > bottom || left > right {
        return None;
    }
    Some((right - left) * (bottom - top))
}

/// Overlap ratio once the intersection area is known.
pub(crate) fn ratio_from_intersection(
    a: &Extent,
    b: &Extent,
    inter: f32,
    method: IouMethod,
) -> f32 {
    match method {
        IouMethod::Union => {
            let union = a.area + b.area - inter;
            if is_near_zero(union) {
                return 0.0;
            }
            inter / union
        }
        IouMethod::Min => {
            let denom = a.area.min(b.area);
            if is_near_zero(denom) {
                return 0.0;
            }
            inter / denom
        }
        IouMethod::Max => {
            let denom = a.area.max(b.area);
            if is_near_zero(denom) {
                return 0.0;
            }
            inter / denom
        }
        IouMethod::Diou => {
            let union = a.area + b.area - inter;
            if is_near_zero(union) {
                return 0.0;
            }
            let dx = a.cx - b.cx;
            let dy = a.cy - b.cy;
            let center_dist = dx * dx + dy * dy;
            let out_w = a.right.max(b.right) - a.left.min(b.left);
            let out_h = a.bottom.max(b.bottom) - a.top.min(b.top);
            let diag = out_w * out_w + out_h * out_h;
            if is_near_zero(diag) {
                return 0.0;
            }
            inter / union - center_dist / diag
        }
    }
}

pub(crate) fn extent_iou(a: &Extent, b: &Extent, method: IouMethod) -> f32 {
    match extent_intersection(a, b) {
        Some(inter) => ratio_from_intersection(a, b, inter, method),
        None => 0.0,
    }
}

/// Returns the overlap area of two boxes.
///
/// `None` means the boxes do not overlap on some axis or one of them fails
/// the sanity bounds. Boxes that only touch along an edge give `Some(0.0)`.
pub fn intersection_area<A, B>(a: &A, b: &B) -> Option<f32>
where
    A: BoxGeometry + ?Sized,
    B: BoxGeometry + ?Sized,
{
    extent_intersection(&Extent::of(a), &Extent::of(b))
}

/// Computes the overlap ratio of two boxes under `method`.
pub fn iou<A, B>(a: &A, b: &B, method: IouMethod) -> f32
where
    A: BoxGeometry + ?Sized,
    B: BoxGeometry + ?Sized,
{
    extent_iou(&Extent::of(a), &Extent::of(b), method)
}

#[cfg(test)]
mod tests {
    use super::{intersection_area, iou, IouMethod};
    use crate::geometry::{CenterBox, CornerBox};

    #[test]
    fn intersection_of_offset_squares() {
        let a = CornerBox::new(0.0, 0.0, 10.0, 10.0);
        let b = CornerBox::new(5.0, 5.0, 15.0, 15.0);
        let area = intersection_area(&a, &b).unwrap();
        assert!((area - 25.0).abs() < 1e-6);
    }

    #[test]
    fn touching_edges_intersect_with_zero_area() {
        let a = CornerBox::new(0.0, 0.0, 10.0, 10.0);
        let b = CornerBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(intersection_area(&a, &b), Some(0.0));
        assert_eq!(iou(&a, &b, IouMethod::Union), 0.0);
    }

    #[test]
    fn mixed_encodings_compare_directly() {
        let a = CenterBox::new(5.0, 5.0, 10.0, 10.0);
        let b = CornerBox::new(5.0, 0.0, 15.0, 10.0);
        let value = iou(&a, &b, IouMethod::Union);
        assert!((value - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn min_and_max_use_the_smaller_and_larger_area() {
        let big = CornerBox::new(0.0, 0.0, 20.0, 20.0);
        let small = CornerBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((iou(&big, &small, IouMethod::Min) - 1.0).abs() < 1e-6);
        assert!((iou(&big, &small, IouMethod::Max) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn diou_penalizes_center_distance() {
        let a = CornerBox::new(0.0, 0.0, 10.0, 10.0);
        let b = CornerBox::new(5.0, 0.0, 15.0, 10.0);
        let union = iou(&a, &b, IouMethod::Union);
        let diou = iou(&a, &b, IouMethod::Diou);
        // centers 5 apart, enclosing box 15x10
        let expected = union - 25.0 / (15.0 * 15.0 + 10.0 * 10.0);
        assert!((diou - expected).abs() < 1e-6);
    }
}
