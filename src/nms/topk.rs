//! Confidence ranking and top-K pruning.

use crate::nms::NmsItem;
use crate::trace::trace_event;

/// Stable sort by descending confidence.
pub(crate) fn sort_by_confidence_desc<T: NmsItem>(items: &mut [T]) {
    items.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
}

/// Sorts by descending confidence and keeps at most `k` items.
///
/// This is a pruning stage of its own, applied before geometric suppression
/// for layouts that emit a very large candidate pool.
pub fn truncate_top_k<T: NmsItem>(items: &mut Vec<T>, k: usize) {
    sort_by_confidence_desc(items);
    if items.len() > k {
        trace_event!("top_k_truncated", total = items.len(), k = k);
        items.truncate(k);
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_top_k;
    use crate::detection::Candidate;
    use crate::geometry::CenterBox;

    fn scored(conf: f32) -> Candidate {
        Candidate::new(CenterBox::new(10.0, 10.0, 2.0, 2.0), 0, conf)
    }

    #[test]
    fn keeps_highest_scores_in_order() {
        let mut items: Vec<Candidate> = [0.2, 0.9, 0.5, 0.7].into_iter().map(scored).collect();
        truncate_top_k(&mut items, 2);
        let scores: Vec<f32> = items.iter().map(|c| c.confidence).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn short_lists_are_only_sorted() {
        let mut items: Vec<Candidate> = [0.1, 0.3].into_iter().map(scored).collect();
        truncate_top_k(&mut items, 8);
        assert_eq!(items.len(), 2);
        assert!((items[0].confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn zero_k_clears() {
        let mut items: Vec<Candidate> = [0.4].into_iter().map(scored).collect();
        truncate_top_k(&mut items, 0);
        assert!(items.is_empty());
    }
}
