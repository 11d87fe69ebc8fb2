//! Layout-specific tensor decoders.
//!
//! Every [`ModelLayout`] case maps to one [`Decoder`] variant. A decoder
//! first checks the tensor list once per batch ([`Decode::check_tensors`]),
//! then turns one image's slices into final detections ([`Decode::decode`]).
//! All element reads go through bounds-checked accessors; rows whose indices
//! fall outside the buffer are skipped.

mod fpn;
mod mindspore;
mod original;
mod precut;
mod yolo;

pub use fpn::FpnDecoder;
pub use mindspore::MindsporeDecoder;
pub use original::OriginalDecoder;
pub use precut::PrecutDecoder;
pub use yolo::YoloDecoder;

use crate::config::{ModelLayout, ModelLayoutDescriptor, PostProcessConfig};
use crate::correct::ResizeInfo;
use crate::detection::Detection;
use crate::geometry::CornerBox;
use crate::tensor::{DType, TensorData, TensorView};
use crate::util::{DetPostError, DetPostResult};

/// Tensor-to-detection decoding for one layout family.
pub trait Decode {
    /// Validates tensor presence, dtypes and shapes; returns the batch size.
    fn check_tensors(&self, tensors: &[TensorView<'_>]) -> DetPostResult<usize>;

    /// Decodes image `image` of the batch into final detections.
    fn decode(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        resize: &ResizeInfo,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Detection>>;
}

/// Closed set of decoders, one per layout family.
#[derive(Clone, Copy, Debug)]
pub enum Decoder<'a> {
    /// Uncut two-stage detector.
    Original(OriginalDecoder<'a>),
    /// Pre-cut two-stage detector.
    NmsPrecut(PrecutDecoder<'a>),
    /// FPN detector.
    Fpn(FpnDecoder<'a>),
    /// MindSpore two-stage detector.
    MindsporeNms(MindsporeDecoder<'a>),
    /// MindSpore two-stage detector with masks.
    MindsporeMask(MindsporeDecoder<'a>),
    /// Anchor-grid detector.
    Yolo(YoloDecoder<'a>),
}

impl<'a> Decoder<'a> {
    /// Selects the decoder for `descriptor`.
    pub fn new(descriptor: &'a ModelLayoutDescriptor) -> Self {
        let class_num = descriptor.class_num;
        match &descriptor.layout {
            ModelLayout::Original(layout) => {
                Decoder::Original(OriginalDecoder::new(layout, class_num))
            }
            ModelLayout::NmsPrecut(layout) => {
                Decoder::NmsPrecut(PrecutDecoder::new(layout, class_num))
            }
            ModelLayout::Fpn(layout) => Decoder::Fpn(FpnDecoder::new(layout, class_num)),
            ModelLayout::MindsporeNms(layout) => {
                Decoder::MindsporeNms(MindsporeDecoder::new(layout, None, class_num))
            }
            ModelLayout::MindsporeMask(layout) => Decoder::MindsporeMask(MindsporeDecoder::new(
                &layout.base,
                Some(layout),
                class_num,
            )),
            ModelLayout::YoloAnchor(layout) => Decoder::Yolo(YoloDecoder::new(layout, class_num)),
        }
    }
}

impl Decode for Decoder<'_> {
    fn check_tensors(&self, tensors: &[TensorView<'_>]) -> DetPostResult<usize> {
        match self {
            Decoder::Original(d) => d.check_tensors(tensors),
            Decoder::NmsPrecut(d) => d.check_tensors(tensors),
            Decoder::Fpn(d) => d.check_tensors(tensors),
            Decoder::MindsporeNms(d) | Decoder::MindsporeMask(d) => d.check_tensors(tensors),
            Decoder::Yolo(d) => d.check_tensors(tensors),
        }
    }

    fn decode(
        &self,
        tensors: &[TensorView<'_>],
        image: usize,
        resize: &ResizeInfo,
        config: &PostProcessConfig,
    ) -> DetPostResult<Vec<Detection>> {
        match self {
            Decoder::Original(d) => d.decode(tensors, image, resize, config),
            Decoder::NmsPrecut(d) => d.decode(tensors, image, resize, config),
            Decoder::Fpn(d) => d.decode(tensors, image, resize, config),
            Decoder::MindsporeNms(d) | Decoder::MindsporeMask(d) => {
                d.decode(tensors, image, resize, config)
            }
            Decoder::Yolo(d) => d.decode(tensors, image, resize, config),
        }
    }
}

/// Element class a tensor must belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Elem {
    /// `F32` or `F16`.
    Float,
    /// Any numeric type (not `Bool`).
    Numeric,
    /// `Bool` or an integer type.
    Flag,
}

impl Elem {
    fn accepts(self, dtype: DType) -> bool {
        match self {
            Elem::Float => matches!(dtype, DType::F32 | DType::F16),
            Elem::Numeric => dtype != DType::Bool,
            Elem::Flag => matches!(dtype, DType::Bool | DType::I32 | DType::I64),
        }
    }

    fn canonical(self) -> DType {
        match self {
            Elem::Float | Elem::Numeric => DType::F32,
            Elem::Flag => DType::Bool,
        }
    }
}

/// Looks up tensor `index` and checks its element class.
pub(crate) fn require<'t, 'a>(
    tensors: &'t [TensorView<'a>],
    index: usize,
    elem: Elem,
    context: &'static str,
) -> DetPostResult<&'t TensorView<'a>> {
    let view = tensors.get(index).ok_or(DetPostError::MissingInput {
        index,
        len: tensors.len(),
        context,
    })?;
    if !elem.accepts(view.dtype()) {
        return Err(DetPostError::TypeMismatch {
            tensor: index,
            expected: elem.canonical(),
            got: view.dtype(),
        });
    }
    Ok(view)
}

/// Checks that every listed tensor shares the first one's batch size.
pub(crate) fn shared_batch(views: &[(usize, &TensorView<'_>)]) -> DetPostResult<usize> {
    let Some((_, first)) = views.first() else {
        return Ok(0);
    };
    let batch = first.batch_size();
    for (index, view) in views {
        if view.batch_size() != batch {
            return Err(DetPostError::InvalidShape {
                tensor: *index,
                shape: view.shape().to_vec(),
                reason: "batch dimension differs from the other outputs",
            });
        }
    }
    Ok(batch)
}

/// Per-image slice of tensor `index`.
pub(crate) fn image_slice<'a>(
    tensors: &[TensorView<'a>],
    index: usize,
    image: usize,
) -> DetPostResult<TensorData<'a>> {
    let view = tensors.get(index).ok_or(DetPostError::MissingInput {
        index,
        len: tensors.len(),
        context: "image slice",
    })?;
    view.image(image).ok_or(DetPostError::OutOfRange {
        needed: image + 1,
        got: view.batch_size(),
        context: "image index",
    })
}

/// Reads `N` consecutive floats starting at `base`.
pub(crate) fn read_row<const N: usize>(data: &TensorData<'_>, base: usize) -> Option<[f32; N]> {
    let mut row = [0.0f32; N];
    for (offset, slot) in row.iter_mut().enumerate() {
        *slot = data.f32_at(base.checked_add(offset)?)?;
    }
    Some(row)
}

/// Number of valid rows announced by a count tensor, capped at `cap`.
pub(crate) fn announced_count(count: &TensorData<'_>, cap: usize) -> usize {
    match count.f32_at(0) {
        Some(n) if n.is_finite() && n > 0.0 => (n as usize).min(cap),
        _ => 0,
    }
}

/// Builds a detection and attaches its label.
pub(crate) fn labeled(
    bbox: CornerBox,
    class_id: i32,
    confidence: f32,
    config: &PostProcessConfig,
) -> Detection {
    Detection {
        bbox,
        class_id,
        confidence,
        class_name: config.class_name(class_id),
        mask: None,
    }
}
