//! Class-partitioned greedy non-maximum suppression.
//!
//! Items are grouped by class id (ascending), ranked within each class by
//! the chosen [`SortCriterion`], then swept left to right. Every kept item
//! removes the later items whose IoU with it is strictly above the threshold.

pub mod topk;

use crate::detection::{Candidate, Detection};
use crate::geometry::iou::{extent_iou, Extent, IouMethod};
use crate::geometry::{BoxGeometry, CenterBox, CornerBox};
use crate::trace::trace_event;
use std::collections::BTreeMap;

/// Ranking used before the suppression sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortCriterion {
    /// Highest confidence first.
    #[default]
    ByConfidence,
    /// Largest box area first.
    ByArea,
}

/// Anything that can take part in suppression.
pub trait NmsItem {
    /// Box encoding carried by the item.
    type Geometry: BoxGeometry;

    /// The item's box.
    fn geometry(&self) -> &Self::Geometry;

    /// Class partition key.
    fn class_id(&self) -> i32;

    /// Ranking score.
    fn confidence(&self) -> f32;
}

impl NmsItem for Detection {
    type Geometry = CornerBox;

    fn geometry(&self) -> &CornerBox {
        &self.bbox
    }

    fn class_id(&self) -> i32 {
        self.class_id
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

impl NmsItem for Candidate {
    type Geometry = CenterBox;

    fn geometry(&self) -> &CenterBox {
        &self.bbox
    }

    fn class_id(&self) -> i32 {
        self.class_id
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Suppresses overlapping items in place.
///
/// The output holds the survivors grouped by ascending class id, each group
/// in ranking order. An IoU exactly equal to `iou_thresh` does not suppress.
/// Running the function again on its own output changes nothing.
pub fn suppress<T: NmsItem>(
    items: &mut Vec<T>,
    iou_thresh: f32,
    method: IouMethod,
    sort_by: SortCriterion,
) {
    if items.is_empty() {
        return;
    }
    let before = items.len();

    let mut groups: BTreeMap<i32, Vec<T>> = BTreeMap::new();
    for item in items.drain(..) {
        groups.entry(item.class_id()).or_default().push(item);
    }

    for (_, mut group) in groups {
        rank(&mut group, sort_by);
        sweep(group, iou_thresh, method, items);
    }

    trace_event!("nms_done", before = before, after = items.len());
}

fn rank<T: NmsItem>(group: &mut [T], sort_by: SortCriterion) {
    match sort_by {
        SortCriterion::ByConfidence => topk::sort_by_confidence_desc(group),
        SortCriterion::ByArea => {
            group.sort_by(|a, b| b.geometry().area().total_cmp(&a.geometry().area()))
        }
    }
}

fn sweep<T: NmsItem>(mut group: Vec<T>, iou_thresh: f32, method: IouMethod, out: &mut Vec<T>) {
    let extents: Vec<Extent> = group.iter().map(|item| Extent::of(item.geometry())).collect();
    let mut suppressed = vec![false; group.len()];
    let mut overlaps = Vec::with_capacity(group.len());
    for idx in 0..extents.len() {
        if suppressed[idx] {
            continue;
        }
        tail_overlaps(&extents[idx], &extents[idx + 1..], method, &mut overlaps);
        for (flag, &overlap) in suppressed[idx + 1..].iter_mut().zip(&overlaps) {
            if overlap > iou_thresh {
                *flag = true;
            }
        }
    }
    let mut flags = suppressed.iter();
    group.retain(|_| !flags.next().copied().unwrap_or(false));
    out.append(&mut group);
}

#[cfg(feature = "simd")]
fn tail_overlaps(keeper: &Extent, tail: &[Extent], method: IouMethod, out: &mut Vec<f32>) {
    if method == IouMethod::Union {
        crate::simd::union_overlaps(keeper, tail, out);
    } else {
        scalar_overlaps(keeper, tail, method, out);
    }
}

#[cfg(not(feature = "simd"))]
fn tail_overlaps(keeper: &Extent, tail: &[Extent], method: IouMethod, out: &mut Vec<f32>) {
    scalar_overlaps(keeper, tail, method, out);
}

pub(crate) fn scalar_overlaps(
    keeper: &Extent,
    tail: &[Extent],
    method: IouMethod,
    out: &mut Vec<f32>,
) {
    out.clear();
    out.extend(tail.iter().map(|other| extent_iou(keeper, other, method)));
}

#[cfg(test)]
mod tests {
    use super::{suppress, SortCriterion};
    use crate::detection::{Candidate, Detection};
    use crate::geometry::iou::IouMethod;
    use crate::geometry::{CenterBox, CornerBox};

    fn cand(x: f32, y: f32, w: f32, h: f32, conf: f32, class_id: i32) -> Candidate {
        Candidate::new(CenterBox::new(x, y, w, h), class_id, conf)
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut items: Vec<Candidate> = Vec::new();
        suppress(&mut items, 0.0, IouMethod::Max, SortCriterion::ByArea);
        assert!(items.is_empty());
    }

    #[test]
    fn suppressed_items_do_not_suppress_others() {
        // a chain: each neighbour overlaps by 0.25, the ends not at all
        let mut items = vec![
            cand(32.0, 20.0, 10.0, 10.0, 0.7, 0),
            cand(20.0, 20.0, 10.0, 10.0, 0.9, 0),
            cand(26.0, 20.0, 10.0, 10.0, 0.8, 0),
        ];
        suppress(&mut items, 0.2, IouMethod::Union, SortCriterion::ByConfidence);
        assert_eq!(items.len(), 2);
        assert!((items[0].confidence - 0.9).abs() < 1e-6);
        assert!((items[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn equal_iou_is_not_suppressed() {
        // IoU of these two boxes is exactly 0.5
        let mut items = vec![
            Detection::new(CornerBox::new(0.0, 0.0, 20.0, 10.0), 0, 0.9),
            Detection::new(CornerBox::new(0.0, 0.0, 10.0, 10.0), 0, 0.8),
        ];
        suppress(&mut items, 0.5, IouMethod::Union, SortCriterion::ByConfidence);
        assert_eq!(items.len(), 2);

        suppress(&mut items, 0.49, IouMethod::Union, SortCriterion::ByConfidence);
        assert_eq!(items.len(), 1);
        assert!((items[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn classes_are_suppressed_independently_in_ascending_order() {
        let mut items = vec![
            cand(50.0, 50.0, 10.0, 10.0, 0.7, 3),
            cand(50.0, 50.0, 10.0, 10.0, 0.9, 1),
            cand(50.0, 50.0, 10.0, 10.0, 0.6, 3),
        ];
        suppress(&mut items, 0.5, IouMethod::Union, SortCriterion::ByConfidence);
        let classes: Vec<i32> = items.iter().map(|c| c.class_id).collect();
        assert_eq!(classes, vec![1, 3]);
        assert!((items[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn comparison_is_only_against_kept_items() {
        // b overlaps a and is removed; c overlaps only b and must survive.
        let mut items = vec![
            cand(100.0, 100.0, 20.0, 20.0, 0.9, 0),
            cand(110.0, 100.0, 20.0, 20.0, 0.8, 0),
            cand(115.0, 100.0, 20.0, 20.0, 0.7, 0),
        ];
        suppress(&mut items, 0.3, IouMethod::Union, SortCriterion::ByConfidence);
        let xs: Vec<f32> = items.iter().map(|c| c.bbox.x).collect();
        assert_eq!(xs, vec![100.0, 115.0]);
    }

    #[test]
    fn ties_keep_input_order() {
        let mut items = vec![
            cand(10.0, 10.0, 4.0, 4.0, 0.5, 0),
            cand(200.0, 200.0, 4.0, 4.0, 0.5, 0),
        ];
        suppress(&mut items, 0.5, IouMethod::Union, SortCriterion::ByConfidence);
        assert_eq!(items[0].bbox.x, 10.0);
        assert_eq!(items[1].bbox.x, 200.0);
    }
}
