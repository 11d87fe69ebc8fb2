use crate::config::{PostProcessConfig, PrecutLayout, DETECT_NUM};
use crate::correct::{reduce_coordinates, ResizeInfo};
use crate::decode::{
    announced_count, image_slice, labeled, read_row, require, shared_batch, Decode, Elem,
};
use crate::detection::Detection;
use crate::geometry::CornerBox;
use crate::nms::suppress;
use crate::tensor::TensorView;
use crate::util::DetPostResult;

/// Decoder for two-stage models that emit a box per class per row.
///
/// Each row keeps its best-scoring class; class ids are reported one-based
/// because column zero of the model's score table is the first foreground
/// class. Boxes are in model-input pixels, stored `(y0, x0, y1, x1)`.
#[derive(Clone, Copy, Debug)]
pub struct PrecutDecoder<'a> {
    layout: &'a PrecutLayout,
    class_num: usize,
}

impl<'a> PrecutDecoder<'a> {
    /// Creates a decoder for `class_num` score columns.
    pub fn new(layout: &'a PrecutLayout, class_num: usize) -> Self {
        Self { layout, class_num }
    }
}

impl Decode for PrecutDecoder<'_> {
    fn check_tensors(&self, tensors: &[TensorView<'_>]) -> DetPostResult<usize> {
        let l = self.layout;
        let count = require(tensors, l.object_num_tensor, Elem::Numeric, "object count")?;
        let bbox = require(tensors, l.bbox_tensor, Elem::Float, "bounding boxes")?;
        let conf = require(tensors, l.confidence_tensor, Elem::Float, "confidence")?;
        shared_batch(&[
            (l.object_num_tensor, count),
            (l.bbox_tensor, bbox),
            (l.confidence_tensor, conf),
        ])
    }

    fn decode(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        resize: &ResizeInfo,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Detection>> {
        let l = self.layout;
        let count = image_slice(tensors, l.object_num_tensor, image)?;
        let bbox = image_slice(tensors, l.bbox_tensor, image)?;
        let conf = image_slice(tensors, l.confidence_tensor, image)?;

        let classes = self.class_num;
        let rows = announced_count(&count, DETECT_NUM);
        let mut dets = Vec::with_capacity(rows);
        for j in 0..rows {
            let mut best: Option<(usize, f32)> = None;
            for k in 0..classes {
                let Some(p) = conf.f32_at(j * classes + k) else { break };
                if best.map_or(true, |(_, top)| p > top) {
                    best = Some((k, p));
                }
            }
            let Some((argmax, score)) = best else { continue };
            let Some(thresh) = config.threshold_for(argmax as i64) else { continue };
            if score <= thresh {
                continue;
            }
            let Some([y0, x0, y1, x1]) = read_row::<4>(&bbox, (j * classes + argmax) * 4) else {
                continue;
            };
            let class_id = argmax as i32 + 1;
            dets.push(labeled(CornerBox::new(x0, y0, x1, y1), class_id, score, config));
        }

        suppress(&mut dets, config.iou_thresh, config.iou_method, config.sort_by);
        reduce_coordinates(&mut dets, resize, false)?;
        Ok(dets)
    }
}
