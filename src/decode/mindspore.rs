use crate::config::{MindsporeLayout, MindsporeMaskLayout, PostProcessConfig};
use crate::correct::{clamp_to_image, ResizeInfo};
use crate::decode::{image_slice, labeled, read_row, require, shared_batch, Decode, Elem};
use crate::detection::{Candidate, Detection, Mask};
use crate::geometry::iou::IouMethod;
use crate::geometry::{CenterBox, CornerBox};
use crate::mask::{decode_mask, decode_mask_f16, mask_extent};
use crate::nms::topk::truncate_top_k;
use crate::nms::{suppress, SortCriterion};
use crate::tensor::{TensorData, TensorView};
use crate::trace::trace_skip;
use crate::util::{DetPostError, DetPostResult};

const BBOX_TENSOR: usize = 0;
const LABEL_TENSOR: usize = 1;
const FLAG_TENSOR: usize = 2;
const MASK_TENSOR: usize = 3;

/// Decoder for MindSpore two-stage models, optionally with instance masks.
///
/// Tensor positions are fixed: quintets `(x0, y0, x1, y1, score)`, labels and
/// validity flags, plus soft-mask patches for the masked variant. Candidates
/// pass a top-K cut, then confidence-ranked suppression with IoU over the
/// larger area, then get clamped to the original image.
#[derive(Clone, Copy, Debug)]
pub struct MindsporeDecoder<'a> {
    layout: &'a MindsporeLayout,
    masks: Option<&'a MindsporeMaskLayout>,
    class_num: usize,
}

impl<'a> MindsporeDecoder<'a> {
    /// Creates a decoder; pass `masks` for the masked variant.
    pub fn new(
        layout: &'a MindsporeLayout,
        masks: Option<&'a MindsporeMaskLayout>,
        class_num: usize,
    ) -> Self {
        Self {
            layout,
            masks,
            class_num,
        }
    }

    fn slot_count(&self) -> DetPostResult<usize> {
        self.layout
            .rpn_max_num
            .checked_mul(self.class_num)
            .ok_or(DetPostError::InvalidParam {
                reason: "rpn_max_num * class_num overflows usize",
            })
    }

    /// Collects flagged, above-threshold proposals of one image.
    ///
    /// The masked variant uses a strict `>` threshold; the plain variant keeps
    /// scores equal to the threshold.
    pub fn candidates(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Candidate>> {
        let bbox = image_slice(tensors, BBOX_TENSOR, image)?;
        let labels = image_slice(tensors, LABEL_TENSOR, image)?;
        let flags = image_slice(tensors, FLAG_TENSOR, image)?;
        let strict = self.masks.is_some();

        let mut out = Vec::new();
        for slot in 0..self.slot_count()? {
            let Some(flag) = flags.bool_at(slot) else { break };
            if !flag {
                continue;
            }
            let Some(base) = slot.checked_mul(5) else { break };
            let (Some(label), Some([x0, y0, x1, y1, score])) =
                (labels.i64_at(slot), read_row::<5>(&bbox, base))
            else {
                break;
            };
            let Some(thresh) = config.threshold_for(label) else { continue };
            let rejected = if strict { score <= thresh } else { score < thresh };
            if rejected {
                continue;
            }
            let Ok(class_id) = i32::try_from(label) else { continue };
            let bbox = CenterBox::from_corners(x0, y0, x1, y1);
            let mut cand = Candidate::new(bbox, class_id, score);
            if strict {
                cand.mask_slot = Some(slot);
            }
            out.push(cand);
        }
        Ok(out)
    }

    fn attach_mask(
        &self,
        masks: &MindsporeMaskLayout,
        patches: &TensorData<'_>,
        slot: usize,
        bbox: &CornerBox,
    ) -> DetPostResult<Mask> {
        let (width, height) = mask_extent(bbox)?;
        let size = masks.mask_size;
        let overflow = || DetPostError::InvalidShape {
            tensor: MASK_TENSOR,
            shape: vec![slot, size, size],
            reason: "mask patch offset overflows usize",
        };
        let area = size.checked_mul(size).ok_or_else(overflow)?;
        let start = slot.checked_mul(area).ok_or_else(overflow)?;
        let end = start.checked_add(area).ok_or_else(overflow)?;
        let (width, height) = (width as i64, height as i64);
        match patches {
            TensorData::F16(data) => {
                let patch = data.get(start..).unwrap_or(&[]);
                decode_mask_f16(patch, size, width, height, masks.mask_thresh)
            }
            other => {
                let patch: Vec<f32> = (start..end).map_while(|i| other.f32_at(i)).collect();
                decode_mask(&patch, size, size, width, height, masks.mask_thresh)
            }
        }
    }
}

impl Decode for MindsporeDecoder<'_> {
    fn check_tensors(&self, tensors: &[TensorView<'_>]) -> DetPostResult<usize> {
        let bbox = require(tensors, BBOX_TENSOR, Elem::Float, "bounding boxes")?;
        let labels = require(tensors, LABEL_TENSOR, Elem::Numeric, "labels")?;
        let flags = require(tensors, FLAG_TENSOR, Elem::Flag, "validity flags")?;
        let mut views = vec![
            (BBOX_TENSOR, bbox),
            (LABEL_TENSOR, labels),
            (FLAG_TENSOR, flags),
        ];
        if self.masks.is_some() {
            views.push((
                MASK_TENSOR,
                require(tensors, MASK_TENSOR, Elem::Float, "mask patches")?,
            ));
        }
        shared_batch(&views)
    }

    fn decode(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        resize: &ResizeInfo,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Detection>> {
        let mut cands = self.candidates(tensors, image, config)?;
        truncate_top_k(&mut cands, self.layout.max_per_img);
        suppress(
            &mut cands,
            config.iou_thresh,
            IouMethod::Max,
            SortCriterion::ByConfidence,
        );

        let patches = match self.masks {
            Some(_) => Some(image_slice(tensors, MASK_TENSOR, image)?),
            None => None,
        };
        let width = resize.width_original as f32;
        let height = resize.height_original as f32;

        let mut dets = Vec::with_capacity(cands.len());
        for cand in &cands {
            if cand.class_id < 0 {
                continue;
            }
            let bbox = clamp_to_image(&cand.bbox, width, height);
            let mut det = labeled(bbox, cand.class_id, cand.confidence, config);
            if let (Some(masks), Some(patches), Some(slot)) =
                (self.masks, patches.as_ref(), cand.mask_slot)
            {
                match self.attach_mask(masks, patches, slot, &bbox) {
                    Ok(mask) => det.mask = Some(mask),
                    Err(_) => {
                        trace_skip!("mask extent", slot = slot, class_id = cand.class_id);
                        continue;
                    }
                }
            }
            dets.push(det);
        }
        Ok(dets)
    }
}
