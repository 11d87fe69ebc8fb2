//! Post-processing configuration and model layout descriptors.
//!
//! Both structs are plain data built once by the caller and passed by
//! reference into every decode call. Defaults mirror the values the supported
//! detector families are usually exported with.

use crate::geometry::iou::IouMethod;
use crate::nms::SortCriterion;
use crate::util::{DetPostError, DetPostResult};

/// Number of detection rows the two-stage layouts emit per image.
pub const DETECT_NUM: usize = 100;

/// Largest accepted soft-mask patch edge.
pub const MAX_MASK_SIZE: usize = 100;

/// Thresholds and suppression policy shared by all layouts.
#[derive(Clone, Debug, PartialEq)]
pub struct PostProcessConfig {
    /// Uniform score threshold; also the argmax floor for YOLO class scores.
    pub score_thresh: f32,
    /// Per-class thresholds indexed by class id. Empty means uniform.
    pub separate_score_thresh: Vec<f32>,
    /// IoU above which a lower-ranked box is suppressed.
    pub iou_thresh: f32,
    /// IoU variant used by layouts that run the configurable suppression.
    pub iou_method: IouMethod,
    /// Ranking used before suppression.
    pub sort_by: SortCriterion,
    /// Class labels indexed by class id.
    pub class_names: Vec<String>,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            score_thresh: 0.5,
            separate_score_thresh: Vec::new(),
            iou_thresh: 0.45,
            iou_method: IouMethod::Union,
            sort_by: SortCriterion::ByConfidence,
            class_names: Vec::new(),
        }
    }
}

fn unit_range(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

impl PostProcessConfig {
    /// Checks thresholds against a model with `class_num` classes.
    pub fn validate(&self, class_num: usize) -> DetPostResult<()> {
        if !unit_range(self.score_thresh) {
            return Err(DetPostError::InvalidParam {
                reason: "score_thresh must be within [0, 1]",
            });
        }
        if !unit_range(self.iou_thresh) {
            return Err(DetPostError::InvalidParam {
                reason: "iou_thresh must be within [0, 1]",
            });
        }
        if !self.separate_score_thresh.is_empty() {
            if self.separate_score_thresh.len() != class_num {
                return Err(DetPostError::InvalidParam {
                    reason: "separate_score_thresh length must equal the class count",
                });
            }
            if !self.separate_score_thresh.iter().copied().all(unit_range) {
                return Err(DetPostError::InvalidParam {
                    reason: "separate_score_thresh values must be within [0, 1]",
                });
            }
        }
        Ok(())
    }

    /// Score threshold for `class_id`, or `None` when the id has no threshold.
    pub fn threshold_for(&self, class_id: i64) -> Option<f32> {
        let idx = usize::try_from(class_id).ok()?;
        if self.separate_score_thresh.is_empty() {
            return Some(self.score_thresh);
        }
        self.separate_score_thresh.get(idx).copied()
    }

    /// Label for `class_id` if one is configured.
    pub fn class_name(&self, class_id: i32) -> Option<String> {
        let idx = usize::try_from(class_id).ok()?;
        self.class_names.get(idx).cloned()
    }
}

/// Tensor indices of the uncut two-stage layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalLayout {
    /// `[batch, 1]` detection count.
    pub object_num_tensor: usize,
    /// `[batch, DETECT_NUM]` scores.
    pub confidence_tensor: usize,
    /// `[batch, DETECT_NUM, 4]` boxes stored `(y0, x0, y1, x1)`.
    pub bbox_tensor: usize,
    /// `[batch, DETECT_NUM]` class ids.
    pub class_id_tensor: usize,
}

impl Default for OriginalLayout {
    fn default() -> Self {
        Self {
            object_num_tensor: 0,
            confidence_tensor: 1,
            bbox_tensor: 2,
            class_id_tensor: 3,
        }
    }
}

/// Tensor indices of the pre-cut two-stage layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecutLayout {
    /// `[batch, 1]` detection count.
    pub object_num_tensor: usize,
    /// `[batch, DETECT_NUM, classes, 4]` per-class boxes.
    pub bbox_tensor: usize,
    /// `[batch, DETECT_NUM, classes]` per-class scores.
    pub confidence_tensor: usize,
}

impl Default for PrecutLayout {
    fn default() -> Self {
        Self {
            object_num_tensor: 0,
            bbox_tensor: 1,
            confidence_tensor: 2,
        }
    }
}

/// Tensor indices of the FPN layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FpnLayout {
    /// `[batch, DETECT_NUM, 5]` boxes and scores.
    pub bbox_tensor: usize,
    /// `[batch, DETECT_NUM]` int64 class ids.
    pub class_id_tensor: usize,
}

impl Default for FpnLayout {
    fn default() -> Self {
        Self {
            bbox_tensor: 0,
            class_id_tensor: 1,
        }
    }
}

/// Parameters of the MindSpore two-stage layout.
///
/// Tensors are fixed: quintets `[batch, rpn_max_num * classes, 5]` (f16),
/// labels `[batch, rpn_max_num * classes]` (i32), mask flags (bool).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MindsporeLayout {
    /// Proposals per class.
    pub rpn_max_num: usize,
    /// Candidates kept by the top-K stage.
    pub max_per_img: usize,
}

impl Default for MindsporeLayout {
    fn default() -> Self {
        Self {
            rpn_max_num: 1000,
            max_per_img: 128,
        }
    }
}

/// Parameters of the MindSpore masked layout.
#[derive(Clone, Debug, PartialEq)]
pub struct MindsporeMaskLayout {
    /// Proposal and top-K parameters.
    pub base: MindsporeLayout,
    /// Side of the square soft-mask patches.
    pub mask_size: usize,
    /// Binarization threshold applied after resize.
    pub mask_thresh: f32,
}

impl Default for MindsporeMaskLayout {
    fn default() -> Self {
        Self {
            base: MindsporeLayout::default(),
            mask_size: 28,
            mask_thresh: 0.5,
        }
    }
}

/// Arrangement of anchor channels in a YOLO feature map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GridLayout {
    /// `[N, H, W, A * (5 + C)]`.
    Nhwc,
    /// `[N, A * (5 + C), H, W]`.
    Nchw,
    /// `[N, A, H, W, 5 + C]`.
    #[default]
    Nchwc,
}

/// Regression form used to turn raw offsets into boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxDecoding {
    /// `x = (col + σ(tx)) / W`, `w = exp(tw) * anchor / net`.
    Exponential,
    /// `x = (col + 2σ(tx) - 0.5) / W`, `w = (2σ(tw))² * anchor / net`.
    #[default]
    Quadratic,
}

/// Parameters of the anchor-grid single-stage layout.
#[derive(Clone, Debug, PartialEq)]
pub struct YoloLayout {
    /// Anchor `(w, h)` pairs in network pixels, smallest scale first.
    pub anchors: Vec<f32>,
    /// Anchors per grid cell.
    pub anchor_dim: usize,
    /// Minimum sigmoid objectness; values at or below it are rejected.
    pub objectness_thresh: f32,
    /// Undo letterbox padding before suppression.
    pub letterbox: bool,
    /// Channel arrangement of every layer tensor.
    pub grid_layout: GridLayout,
    /// Box regression form.
    pub box_decoding: BoxDecoding,
}

impl Default for YoloLayout {
    fn default() -> Self {
        Self {
            anchors: vec![
                10.0, 13.0, 16.0, 30.0, 33.0, 23.0, 30.0, 61.0, 62.0, 45.0, 59.0, 119.0, 116.0,
                90.0, 156.0, 198.0, 373.0, 326.0,
            ],
            anchor_dim: 3,
            objectness_thresh: 0.001,
            letterbox: true,
            grid_layout: GridLayout::Nchwc,
            box_decoding: BoxDecoding::Quadratic,
        }
    }
}

/// Tensor layout family of a model.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelLayout {
    /// Uncut two-stage detector.
    Original(OriginalLayout),
    /// Per-class pre-cut two-stage detector.
    NmsPrecut(PrecutLayout),
    /// FPN single-output detector.
    Fpn(FpnLayout),
    /// MindSpore two-stage detector.
    MindsporeNms(MindsporeLayout),
    /// MindSpore two-stage detector with instance masks.
    MindsporeMask(MindsporeMaskLayout),
    /// Anchor-grid single-stage detector.
    YoloAnchor(YoloLayout),
}

/// Model layout plus class count.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelLayoutDescriptor {
    /// Number of classes the model scores.
    pub class_num: usize,
    /// Layout family and its parameters.
    pub layout: ModelLayout,
}

impl ModelLayoutDescriptor {
    /// Creates a descriptor.
    pub fn new(class_num: usize, layout: ModelLayout) -> Self {
        Self { class_num, layout }
    }

    /// Checks layout parameters that do not depend on the input tensors.
    pub fn validate(&self) -> DetPostResult<()> {
        if self.class_num == 0 {
            return Err(DetPostError::InvalidParam {
                reason: "class_num must be at least 1",
            });
        }
        match &self.layout {
            ModelLayout::Original(_) | ModelLayout::NmsPrecut(_) | ModelLayout::Fpn(_) => Ok(()),
            ModelLayout::MindsporeNms(params) => validate_mindspore(params),
            ModelLayout::MindsporeMask(params) => {
                validate_mindspore(&params.base)?;
                if params.mask_size == 0 || params.mask_size > MAX_MASK_SIZE {
                    return Err(DetPostError::InvalidParam {
                        reason: "mask_size must be within [1, MAX_MASK_SIZE]",
                    });
                }
                if !unit_range(params.mask_thresh) {
                    return Err(DetPostError::InvalidParam {
                        reason: "mask_thresh must be within [0, 1]",
                    });
                }
                Ok(())
            }
            ModelLayout::YoloAnchor(params) => {
                if params.anchor_dim == 0 {
                    return Err(DetPostError::InvalidParam {
                        reason: "anchor_dim must be at least 1",
                    });
                }
                if params.anchors.is_empty() || params.anchors.len() % (2 * params.anchor_dim) != 0
                {
                    return Err(DetPostError::InvalidParam {
                        reason: "anchors must hold anchor_dim (w, h) pairs per layer",
                    });
                }
                if !unit_range(params.objectness_thresh) {
                    return Err(DetPostError::InvalidParam {
                        reason: "objectness_thresh must be within [0, 1]",
                    });
                }
                Ok(())
            }
        }
    }
}

fn validate_mindspore(params: &MindsporeLayout) -> DetPostResult<()> {
    if params.rpn_max_num == 0 {
        return Err(DetPostError::InvalidParam {
            reason: "rpn_max_num must be at least 1",
        });
    }
    Ok(())
}
