use detpost::{
    process, CornerBox, DetPostError, FpnLayout, ModelLayout, ModelLayoutDescriptor,
    PostProcessConfig, ResizeInfo, ResizeMode, TensorView, YoloLayout,
};

fn assert_box(actual: CornerBox, expected: [f32; 4]) {
    let got = [actual.x0, actual.y0, actual.x1, actual.y1];
    for (g, e) in got.iter().zip(expected) {
        assert!((g - e).abs() < 1e-3, "got {got:?}, expected {expected:?}");
    }
}

const CLASSES: usize = 2;
const CHANNELS: usize = 5 + CLASSES;
const ANCHORS: usize = 3;

/// Zeroed NCHWC layer for a batch of `batch` images.
fn layer(batch: usize, side: usize) -> (Vec<f32>, [usize; 5]) {
    let shape = [batch, ANCHORS, side, side, CHANNELS];
    (vec![0.0; shape.iter().product()], shape)
}

fn set_slot(
    data: &mut [f32],
    side: usize,
    anchor: usize,
    row: usize,
    col: usize,
    values: [f32; 7],
) {
    let stride = side * side;
    let base = CHANNELS * stride * anchor + (row * side + col) * CHANNELS;
    data[base..base + CHANNELS].copy_from_slice(&values);
}

#[test]
fn yolo_batch_letterbox_suppression_and_mapping() {
    let (l16, s16) = layer(2, 16);
    let (mut l8, s8) = layer(2, 8);
    let (l4, s4) = layer(2, 4);
    // image 0, 8x8 layer, cell (3, 4): a strong and a weaker overlapping anchor
    set_slot(&mut l8, 8, 1, 3, 4, [0.0, 0.0, 0.0, 0.0, 10.0, -10.0, 10.0]);
    set_slot(&mut l8, 8, 0, 3, 4, [0.0, 0.0, 0.0, 0.0, 10.0, -10.0, 2.0]);

    let tensors = [
        TensorView::from_f32(&l16, &s16).unwrap(),
        TensorView::from_f32(&l8, &s8).unwrap(),
        TensorView::from_f32(&l4, &s4).unwrap(),
    ];
    let descriptor =
        ModelLayoutDescriptor::new(CLASSES, ModelLayout::YoloAnchor(YoloLayout::default()));
    let config = PostProcessConfig {
        iou_thresh: 0.3,
        class_names: vec!["a".to_string(), "b".to_string()],
        ..PostProcessConfig::default()
    };
    let resize = [
        ResizeInfo::new(128, 128, 256, 128),
        ResizeInfo::new(128, 128, 256, 128),
    ];

    let batch = process(&tensors, &resize, &descriptor, &config).unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch[1].is_empty());

    let dets = &batch[0];
    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].class_id, 1);
    assert_eq!(dets[0].class_name.as_deref(), Some("b"));
    // anchor (62, 45) on a 128 px net with a 64 px content band; the gain
    // ratio then doubles the vertical extent and the bottom edge clamps
    assert_box(dets[0].bbox, [82.0, 6.0, 206.0, 128.0]);
}

#[test]
fn fpn_batch_uses_each_images_resize_info() {
    let mut boxes = vec![0.0f32; 2 * 100 * 5];
    let row = [10.0, 20.0, 30.0, 40.0, 0.9];
    boxes[..5].copy_from_slice(&row);
    boxes[5..10].copy_from_slice(&[50.0, 60.0, 90.0, 95.0, 0.8]);
    boxes[500..505].copy_from_slice(&row);
    let classes = vec![0i64; 2 * 100];
    let tensors = [
        TensorView::from_f32(&boxes, &[2, 100, 5]).unwrap(),
        TensorView::from_i64(&classes, &[2, 100]).unwrap(),
    ];
    let descriptor = ModelLayoutDescriptor::new(1, ModelLayout::Fpn(FpnLayout::default()));
    let resize = [
        ResizeInfo::new(100, 100, 400, 200)
            .with_resize_mode(ResizeMode::KeepAspectRatio { scaling: 0.25 }),
        ResizeInfo::new(100, 100, 1000, 1000).with_crop(CornerBox::new(100.0, 50.0, 300.0, 150.0)),
        // extra entries are ignored
        ResizeInfo::new(1, 1, 1, 1),
    ];

    let batch = process(&tensors, &resize, &descriptor, &PostProcessConfig::default()).unwrap();
    assert_eq!(batch.len(), 2);

    // second row starts below the image once rescaled and is dropped
    assert_eq!(batch[0].len(), 1);
    assert_box(batch[0][0].bbox, [40.0, 80.0, 120.0, 160.0]);

    assert_eq!(batch[1].len(), 1);
    assert_box(batch[1][0].bbox, [120.0, 70.0, 160.0, 90.0]);
}

#[test]
fn mismatched_batch_dimensions_fail_the_call() {
    let boxes = vec![0.0f32; 2 * 100 * 5];
    let classes = vec![0i64; 100];
    let tensors = [
        TensorView::from_f32(&boxes, &[2, 100, 5]).unwrap(),
        TensorView::from_i64(&classes, &[1, 100]).unwrap(),
    ];
    let descriptor = ModelLayoutDescriptor::new(1, ModelLayout::Fpn(FpnLayout::default()));
    let resize = [ResizeInfo::new(10, 10, 10, 10); 2];
    let err = process(&tensors, &resize, &descriptor, &PostProcessConfig::default()).unwrap_err();
    assert!(matches!(err, DetPostError::InvalidShape { tensor: 1, .. }));
}

#[test]
fn empty_results_are_not_errors() {
    let boxes = vec![0.0f32; 100 * 5];
    let classes = vec![0i64; 100];
    let tensors = [
        TensorView::from_f32(&boxes, &[1, 100, 5]).unwrap(),
        TensorView::from_i64(&classes, &[1, 100]).unwrap(),
    ];
    let descriptor = ModelLayoutDescriptor::new(1, ModelLayout::Fpn(FpnLayout::default()));
    let resize = [ResizeInfo::new(10, 10, 10, 10)];
    let batch = process(&tensors, &resize, &descriptor, &PostProcessConfig::default()).unwrap();
    assert_eq!(batch, vec![Vec::new()]);
}
