//! detpost turns raw detector outputs into clean per-image detections.
//!
//! The crate understands several tensor layouts (uncut and pre-cut two-stage
//! detectors, FPN, MindSpore two-stage with optional instance masks, and
//! anchor-grid single-stage models), decodes them into boxes, runs
//! class-partitioned greedy NMS with selectable IoU and ranking policies, and
//! maps the survivors back to original-image pixels.
//!
//! The usual entry point is [`process`]. Optional features: `rayon` adds
//! [`process_par`], `simd` vectorizes the union-IoU sweep, and `tracing`
//! emits spans and events.

pub mod config;
pub mod correct;
pub mod decode;
pub mod detection;
pub mod geometry;
pub mod lowlevel;
pub mod mask;
pub mod nms;
mod pipeline;
#[cfg(feature = "simd")]
mod simd;
pub mod tensor;
mod trace;
pub mod util;

pub use config::{
    BoxDecoding, FpnLayout, GridLayout, MindsporeLayout, MindsporeMaskLayout, ModelLayout,
    ModelLayoutDescriptor, OriginalLayout, PostProcessConfig, PrecutLayout, YoloLayout,
    DETECT_NUM, MAX_MASK_SIZE,
};
pub use correct::{ResizeInfo, ResizeMode};
pub use detection::{Detection, DetectionBatch, Mask};
pub use geometry::iou::IouMethod;
pub use geometry::{CenterBox, CornerBox};
pub use nms::SortCriterion;
#[cfg(feature = "rayon")]
pub use pipeline::process_par;
pub use pipeline::process;
pub use tensor::{DType, TensorData, TensorView};
pub use util::{DetPostError, DetPostResult};
