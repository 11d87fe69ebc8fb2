//! Axis-aligned box encodings.
//!
//! Boxes come in two interchangeable encodings: [`CenterBox`] (center plus
//! width/height) and [`CornerBox`] (top-left and bottom-right corners). Both
//! implement [`BoxGeometry`], which is all the IoU and NMS code needs.

pub mod iou;

/// Largest coordinate or extent accepted by the IoU sanity check, in pixels.
pub const MAX_EDGE: f32 = 8192.0;

/// Box encoded as center point plus width and height.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CenterBox {
    /// Center x.
    pub x: f32,
    /// Center y.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

/// Box encoded as its two corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CornerBox {
    /// Left edge.
    pub x0: f32,
    /// Top edge.
    pub y0: f32,
    /// Right edge.
    pub x1: f32,
    /// Bottom edge.
    pub y1: f32,
}

impl CenterBox {
    /// Creates a center-encoded box.
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Builds a center box from its two corners.
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: (x0 + x1) / 2.0,
            y: (y0 + y1) / 2.0,
            w: x1 - x0,
            h: y1 - y0,
        }
    }
}

impl CornerBox {
    /// Creates a corner-encoded box.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box width, `x1 - x0`.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Box height, `y1 - y0`.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

fn in_range(value: f32) -> bool {
    (0.0..=MAX_EDGE).contains(&value)
}

/// Common view over both box encodings.
pub trait BoxGeometry {
    /// Returns the box in corner form.
    fn corners(&self) -> CornerBox;

    /// Returns the box in center form.
    fn center(&self) -> CenterBox;

    /// Area in the box's own encoding.
    fn area(&self) -> f32;

    /// Whether every coordinate and extent lies in `[0, MAX_EDGE]`.
    ///
    /// Boxes failing this check never overlap anything.
    fn is_sane(&self) -> bool;
}

impl BoxGeometry for CenterBox {
    fn corners(&self) -> CornerBox {
        CornerBox {
            x0: self.x - self.w / 2.0,
            y0: self.y - self.h / 2.0,
            x1: self.x + self.w / 2.0,
            y1: self.y + self.h / 2.0,
        }
    }

    fn center(&self) -> CenterBox {
        *self
    }

    fn area(&self) -> f32 {
        self.w * self.h
    }

    fn is_sane(&self) -> bool {
        [self.x, self.y, self.w, self.h].into_iter().all(in_range)
    }
}

impl BoxGeometry for CornerBox {
    fn corners(&self) -> CornerBox {
        *self
    }

    fn center(&self) -> CenterBox {
        CenterBox::from_corners(self.x0, self.y0, self.x1, self.y1)
    }

    fn area(&self) -> f32 {
        self.width() * self.height()
    }

    fn is_sane(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .into_iter()
            .all(in_range)
            && self.x1 >= self.x0
            && self.y1 >= self.y0
    }
}
