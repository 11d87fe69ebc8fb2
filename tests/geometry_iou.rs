use detpost::lowlevel::{intersection_area, iou, BoxGeometry, MAX_EDGE};
use detpost::{CenterBox, CornerBox, IouMethod};

const METHODS: [IouMethod; 4] = [
    IouMethod::Union,
    IouMethod::Min,
    IouMethod::Max,
    IouMethod::Diou,
];

#[test]
fn box_overlaps_itself_completely() {
    let boxes = [
        CenterBox::new(50.0, 50.0, 20.0, 10.0),
        CenterBox::new(400.0, 300.0, 1.0, 1.0),
        CenterBox::new(4000.0, 10.0, 120.0, 18.5),
    ];
    for b in boxes {
        assert!((iou(&b, &b, IouMethod::Union) - 1.0).abs() < 1e-6);
        assert!((iou(&b.corners(), &b.corners(), IouMethod::Union) - 1.0).abs() < 1e-6);
    }
}

#[test]
fn zero_area_box_has_zero_self_iou() {
    let flat = CenterBox::new(50.0, 50.0, 0.0, 10.0);
    assert_eq!(iou(&flat, &flat, IouMethod::Union), 0.0);
    assert_eq!(iou(&flat, &flat, IouMethod::Min), 0.0);
}

#[test]
fn disjoint_boxes_score_zero_for_every_method() {
    let a = CornerBox::new(0.0, 0.0, 10.0, 10.0);
    let b = CornerBox::new(20.0, 0.0, 30.0, 10.0);
    let c = CornerBox::new(0.0, 40.0, 10.0, 50.0);
    assert_eq!(intersection_area(&a, &b), None);
    for method in METHODS {
        assert_eq!(iou(&a, &b, method), 0.0);
        assert_eq!(iou(&a, &c, method), 0.0);
    }
}

#[test]
fn ratio_denominators_follow_the_method() {
    let a = CornerBox::new(0.0, 0.0, 10.0, 10.0);
    let b = CornerBox::new(5.0, 0.0, 10.0, 10.0);
    assert_eq!(intersection_area(&a, &b), Some(50.0));
    assert!((iou(&a, &b, IouMethod::Union) - 0.5).abs() < 1e-6);
    assert!((iou(&a, &b, IouMethod::Min) - 1.0).abs() < 1e-6);
    assert!((iou(&a, &b, IouMethod::Max) - 0.5).abs() < 1e-6);
}

#[test]
fn diou_penalizes_center_distance() {
    let a = CornerBox::new(0.0, 0.0, 10.0, 10.0);
    let b = CornerBox::new(5.0, 0.0, 15.0, 10.0);
    let union = iou(&a, &b, IouMethod::Union);
    let diou = iou(&a, &b, IouMethod::Diou);
    assert!((union - 1.0 / 3.0).abs() < 1e-6);
    assert!((diou - (1.0 / 3.0 - 25.0 / 325.0)).abs() < 1e-6);

    // center-encoded boxes give the same answer
    let diou_center = iou(&a.center(), &b.center(), IouMethod::Diou);
    assert!((diou - diou_center).abs() < 1e-6);
}

#[test]
fn out_of_range_boxes_never_overlap() {
    let inside = CenterBox::new(100.0, 100.0, 50.0, 50.0);
    let negative = CenterBox::new(-1.0, 100.0, 50.0, 50.0);
    let huge = CenterBox::new(100.0, 100.0, MAX_EDGE + 1.0, 50.0);
    let inverted = CornerBox::new(120.0, 80.0, 90.0, 120.0);
    for method in METHODS {
        assert_eq!(iou(&inside, &negative, method), 0.0);
        assert_eq!(iou(&inside, &huge, method), 0.0);
        assert_eq!(iou(&inside.corners(), &inverted, method), 0.0);
    }
    assert_eq!(intersection_area(&inside, &negative), None);
}

#[test]
fn mixed_encodings_compare_directly() {
    let center = CenterBox::new(10.0, 10.0, 10.0, 10.0);
    let corners = CornerBox::new(5.0, 5.0, 15.0, 15.0);
    assert!((iou(&center, &corners, IouMethod::Union) - 1.0).abs() < 1e-6);
}
