use crate::config::{FpnLayout, PostProcessConfig, DETECT_NUM};
use crate::correct::{reduce_coordinates, ResizeInfo};
use crate::decode::{image_slice, labeled, read_row, require, shared_batch, Decode, Elem};
use crate::detection::Detection;
use crate::geometry::CornerBox;
use crate::tensor::TensorView;
use crate::trace::trace_skip;
use crate::util::DetPostResult;

/// Decoder for FPN models emitting `[DETECT_NUM, 5]` rows plus class ids.
///
/// Row slots 0..4 are read as `x0, y0, x1, y1, score` in model-input pixels.
/// Exporters label the first slot as the top-left y; deployed models
/// nonetheless produce x there, so the slots are taken positionally.
#[derive(Clone, Copy, Debug)]
pub struct FpnDecoder<'a> {
    layout: &'a FpnLayout,
    class_num: usize,
}

impl<'a> FpnDecoder<'a> {
    /// Creates a decoder for `class_num` classes.
    pub fn new(layout: &'a FpnLayout, class_num: usize) -> Self {
        Self { layout, class_num }
    }
}

impl Decode for FpnDecoder<'_> {
    fn check_tensors(&self, tensors: &[TensorView<'_>]) -> DetPostResult<usize> {
        let l = self.layout;
        let bbox = require(tensors, l.bbox_tensor, Elem::Float, "bounding boxes")?;
        let class = require(tensors, l.class_id_tensor, Elem::Numeric, "class ids")?;
        shared_batch(&[(l.bbox_tensor, bbox), (l.class_id_tensor, class)])
    }

    fn decode(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        resize: &ResizeInfo,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Detection>> {
        let bbox = image_slice(tensors, self.layout.bbox_tensor, image)?;
        let class = image_slice(tensors, self.layout.class_id_tensor, image)?;

        let mut dets = Vec::new();
        for j in 0..DETECT_NUM {
            let Some(class_id) = class.i64_at(j) else { break };
            if class_id < 0 || class_id >= self.class_num as i64 {
                trace_skip!("unknown class", row = j, class_id = class_id);
                continue;
            }
            let Some([x0, y0, x1, y1, score]) = read_row::<5>(&bbox, j * 5) else { break };
            let Some(thresh) = config.threshold_for(class_id) else { continue };
            if score < thresh {
                continue;
            }
            dets.push(labeled(CornerBox::new(x0, y0, x1, y1), class_id as i32, score, config));
        }

        reduce_coordinates(&mut dets, resize, false)?;
        Ok(dets)
    }
}
