//! Batch entry points.
//!
//! [`process`] validates everything structural once, then decodes each image
//! independently. [`process_par`] (feature `rayon`) fans the images out on
//! the rayon pool and returns the same batch.

use crate::config::{ModelLayoutDescriptor, PostProcessConfig};
use crate::correct::ResizeInfo;
use crate::decode::{Decode, Decoder};
use crate::detection::{Detection, DetectionBatch};
use crate::tensor::TensorView;
use crate::trace::trace_span;
use crate::util::{DetPostError, DetPostResult};

/// Checks config, descriptor, tensors and resize metadata; returns the
/// decoder and the batch size.
fn prepare<'d>(
    tensors: &[TensorView<'_>],
    resize_infos: &[ResizeInfo],
    descriptor: &'d ModelLayoutDescriptor,
    config: &PostProcessConfig,
) -> DetPostResult<(Decoder<'d>, usize)> {
    descriptor.validate()?;
    config.validate(descriptor.class_num)?;
    let decoder = Decoder::new(descriptor);
    let batch = decoder.check_tensors(tensors)?;
    if resize_infos.len() < batch {
        return Err(DetPostError::OutOfRange {
            needed: batch,
            got: resize_infos.len(),
            context: "resize infos",
        });
    }
    Ok((decoder, batch))
}

fn decode_image(
    decoder: &Decoder<'_>,
    tensors: &[TensorView<'_>],
    image: usize,
    resize: &ResizeInfo,
    config: &PostProcessConfig,
) -> DetPostResult<Vec<Detection>> {
    let _span = trace_span!("decode_image", image = image).entered();
    decoder.decode(tensors, image, resize, config)
}

/// Turns one inference batch into per-image detections.
///
/// `resize_infos[i]` describes image `i`; extra entries are ignored. Any
/// structural problem fails the whole call.
///
/// # Example
///
/// ```
/// use detpost::{
///     process, FpnLayout, ModelLayout, ModelLayoutDescriptor, PostProcessConfig, ResizeInfo,
///     TensorView,
/// };
///
/// let mut boxes = vec![0.0f32; 100 * 5];
/// boxes[..5].copy_from_slice(&[10.0, 20.0, 30.0, 40.0, 0.9]);
/// let classes = vec![0i64; 100];
/// let tensors = [
///     TensorView::from_f32(&boxes, &[1, 100, 5]).unwrap(),
///     TensorView::from_i64(&classes, &[1, 100]).unwrap(),
/// ];
/// let descriptor = ModelLayoutDescriptor::new(1, ModelLayout::Fpn(FpnLayout::default()));
/// let resize = [ResizeInfo::new(100, 100, 100, 100)];
/// let batch = process(&tensors, &resize, &descriptor, &PostProcessConfig::default()).unwrap();
/// assert_eq!(batch.len(), 1);
/// assert_eq!(batch[0].len(), 1);
/// ```
pub fn process(
    tensors: &[TensorView<'_>],
    resize_infos: &[ResizeInfo],
    descriptor: &ModelLayoutDescriptor,
    config: &PostProcessConfig,
) -> DetPostResult<DetectionBatch> {
    let _span = trace_span!("process_batch", tensors = tensors.len()).entered();
    let (decoder, batch) = prepare(tensors, resize_infos, descriptor, config)?;
    resize_infos
        .iter()
        .take(batch)
        .enumerate()
        .map(|(image, resize)| decode_image(&decoder, tensors, image, resize, config))
        .collect()
}

/// Parallel variant of [`process`]; images are decoded on the rayon pool.
#[cfg(feature = "rayon")]
pub fn process_par(
    tensors: &[TensorView<'_>],
    resize_infos: &[ResizeInfo],
    descriptor: &ModelLayoutDescriptor,
    config: &PostProcessConfig,
) -> DetPostResult<DetectionBatch> {
    use rayon::prelude::*;

    let _span = trace_span!("process_batch", tensors = tensors.len()).entered();
    let (decoder, batch) = prepare(tensors, resize_infos, descriptor, config)?;
    resize_infos[..batch]
        .par_iter()
        .enumerate()
        .map(|(image, resize)| decode_image(&decoder, tensors, image, resize, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::process;
    use crate::config::{FpnLayout, ModelLayout, ModelLayoutDescriptor, PostProcessConfig};
    use crate::correct::ResizeInfo;
    use crate::tensor::TensorView;
    use crate::util::DetPostError;

    #[test]
    fn too_few_resize_infos_fail_the_batch() {
        let boxes = vec![0.0f32; 2 * 100 * 5];
        let classes = vec![0i64; 2 * 100];
        let tensors = [
            TensorView::from_f32(&boxes, &[2, 100, 5]).unwrap(),
            TensorView::from_i64(&classes, &[2, 100]).unwrap(),
        ];
        let descriptor = ModelLayoutDescriptor::new(1, ModelLayout::Fpn(FpnLayout::default()));
        let resize = [ResizeInfo::new(10, 10, 10, 10)];
        let err =
            process(&tensors, &resize, &descriptor, &PostProcessConfig::default()).unwrap_err();
        assert_eq!(
            err,
            DetPostError::OutOfRange {
                needed: 2,
                got: 1,
                context: "resize infos"
            }
        );
    }

    #[test]
    fn invalid_config_is_reported_before_decoding() {
        let descriptor = ModelLayoutDescriptor::new(1, ModelLayout::Fpn(FpnLayout::default()));
        let config = PostProcessConfig {
            score_thresh: -0.1,
            ..PostProcessConfig::default()
        };
        assert!(matches!(
            process(&[], &[], &descriptor, &config),
            Err(DetPostError::InvalidParam { .. })
        ));
    }

    #[test]
    fn missing_tensors_fail_the_batch() {
        let descriptor = ModelLayoutDescriptor::new(1, ModelLayout::Fpn(FpnLayout::default()));
        assert!(matches!(
            process(&[], &[], &descriptor, &PostProcessConfig::default()),
            Err(DetPostError::MissingInput { index: 0, .. })
        ));
    }
}
