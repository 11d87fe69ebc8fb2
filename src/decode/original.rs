use crate::config::{OriginalLayout, PostProcessConfig, DETECT_NUM};
use crate::correct::{reduce_coordinates, ResizeInfo};
use crate::decode::{
    announced_count, image_slice, labeled, read_row, require, shared_batch, Decode, Elem,
};
use crate::detection::Detection;
use crate::geometry::CornerBox;
use crate::tensor::TensorView;
use crate::trace::trace_skip;
use crate::util::DetPostResult;

/// Decoder for models that already ran suppression and emit a count, scores,
/// `(y0, x0, y1, x1)` normalized boxes and class ids.
#[derive(Clone, Copy, Debug)]
pub struct OriginalDecoder<'a> {
    layout: &'a OriginalLayout,
    class_num: usize,
}

impl<'a> OriginalDecoder<'a> {
    /// Creates a decoder for `class_num` classes.
    pub fn new(layout: &'a OriginalLayout, class_num: usize) -> Self {
        Self { layout, class_num }
    }
}

impl Decode for OriginalDecoder<'_> {
    fn check_tensors(&self, tensors: &[TensorView<'_>]) -> DetPostResult<usize> {
        let l = self.layout;
        let count = require(tensors, l.object_num_tensor, Elem::Numeric, "object count")?;
        let conf = require(tensors, l.confidence_tensor, Elem::Float, "confidence")?;
        let bbox = require(tensors, l.bbox_tensor, Elem::Float, "bounding boxes")?;
        let class = require(tensors, l.class_id_tensor, Elem::Numeric, "class ids")?;
        shared_batch(&[
            (l.object_num_tensor, count),
            (l.confidence_tensor, conf),
            (l.bbox_tensor, bbox),
            (l.class_id_tensor, class),
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
        let conf = image_slice(tensors, l.confidence_tensor, image)?;
        let bbox = image_slice(tensors, l.bbox_tensor, image)?;
        let class = image_slice(tensors, l.class_id_tensor, image)?;

        let rows = announced_count(&count, DETECT_NUM);
        let mut dets = Vec::with_capacity(rows);
        for j in 0..rows {
            let Some(class_id) = class.i64_at(j) else { continue };
            if class_id < 0 || class_id >= self.class_num as i64 {
                trace_skip!("unknown class", row = j, class_id = class_id);
                continue;
            }
            let (Some(score), Some(thresh)) = (conf.f32_at(j), config.threshold_for(class_id))
            else {
                continue;
            };
            if score < thresh {
                continue;
            }
            let Some([y0, x0, y1, x1]) = read_row::<4>(&bbox, j * 4) else {
                trace_skip!("box row outside buffer", row = j, class_id = class_id);
                continue;
            };
            dets.push(labeled(CornerBox::new(x0, y0, x1, y1), class_id as i32, score, config));
        }

        reduce_coordinates(&mut dets, resize, true)?;
        Ok(dets)
    }
}
