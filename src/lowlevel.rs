//! Low-level building blocks for custom post-processing pipelines.
//!
//! These items expose the individual stages (IoU, suppression, top-K,
//! per-layout decoders, coordinate correction, mask decode) for callers that
//! assemble their own flow. Most users should prefer [`crate::process`].

pub use crate::correct::{clamp_to_image, reduce_coordinates, ImageMapping, Letterbox};
pub use crate::decode::{
    Decode, Decoder, FpnDecoder, MindsporeDecoder, OriginalDecoder, PrecutDecoder, YoloDecoder,
};
pub use crate::detection::Candidate;
pub use crate::geometry::iou::{intersection_area, iou};
pub use crate::geometry::{BoxGeometry, MAX_EDGE};
pub use crate::mask::{decode_mask, decode_mask_f16, mask_extent};
pub use crate::nms::topk::truncate_top_k;
pub use crate::nms::{suppress, NmsItem};
