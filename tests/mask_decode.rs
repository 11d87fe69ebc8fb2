use detpost::lowlevel::{decode_mask, decode_mask_f16, mask_extent};
use detpost::{CornerBox, DetPostError};
use half::f16;

#[test]
fn uniform_high_patch_sets_every_cell() {
    let patch = vec![0.8f32; 28 * 28];
    let mask = decode_mask(&patch, 28, 28, 37, 11, 0.5).unwrap();
    assert_eq!((mask.width(), mask.height()), (37, 11));
    assert_eq!(mask.count_ones(), 37 * 11);
}

#[test]
fn uniform_low_patch_clears_every_cell() {
    let patch = vec![0.2f32; 28 * 28];
    let mask = decode_mask(&patch, 28, 28, 5, 64, 0.5).unwrap();
    assert_eq!(mask.as_slice().len(), 5 * 64);
    assert_eq!(mask.count_ones(), 0);
}

#[test]
fn threshold_is_exclusive() {
    let patch = vec![0.5f32; 4];
    let mask = decode_mask(&patch, 2, 2, 3, 3, 0.5).unwrap();
    assert_eq!(mask.count_ones(), 0);
}

#[test]
fn half_patches_decode_like_single_precision() {
    // diagonal step; 0 and 1 are exact in both precisions
    let values: Vec<f32> = (0..16)
        .map(|i| if i % 4 + i / 4 >= 3 { 1.0 } else { 0.0 })
        .collect();
    let halves: Vec<f16> = values.iter().map(|&v| f16::from_f32(v)).collect();
    let single = decode_mask(&values, 4, 4, 9, 7, 0.55).unwrap();
    let half = decode_mask_f16(&halves, 4, 9, 7, 0.55).unwrap();
    assert_eq!(single, half);
    assert!(single.count_ones() > 0);
    assert!(single.count_ones() < 9 * 7);
}

#[test]
fn degenerate_targets_are_rejected() {
    let patch = vec![1.0f32; 4];
    assert_eq!(
        decode_mask(&patch, 2, 2, 0, 5, 0.5).unwrap_err(),
        DetPostError::InvalidBox {
            width: 0,
            height: 5
        }
    );
    assert!(matches!(
        mask_extent(&CornerBox::new(10.0, 10.0, 8.5, 20.0)),
        Err(DetPostError::InvalidBox { .. })
    ));
}

#[test]
fn short_patch_is_a_buffer_error() {
    let patch = vec![f16::ONE; 3];
    assert_eq!(
        decode_mask_f16(&patch, 2, 4, 4, 0.5).unwrap_err(),
        DetPostError::BufferTooSmall { needed: 4, got: 3 }
    );
}

#[test]
fn extent_truncates_fractional_edges() {
    let extent = mask_extent(&CornerBox::new(10.2, 4.0, 20.9, 5.5)).unwrap();
    assert_eq!(extent, (11, 2));
}
