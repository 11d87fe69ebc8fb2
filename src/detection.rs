//! Detection records produced by the decoders.

use crate::geometry::{CenterBox, CornerBox};

/// Binary instance mask sized to a detection's pixel extent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl Mask {
    pub(crate) fn from_parts(width: usize, height: usize, data: Vec<bool>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    /// Mask width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Mask height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major cell values.
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// Returns the cell at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<bool> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Iterates over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.data.chunks(self.width.max(1))
    }

    /// Number of set cells.
    pub fn count_ones(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

/// Final per-image detection in corner form.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Bounding box in original-image pixels.
    pub bbox: CornerBox,
    /// Class index as reported by the model (after any layout offset).
    pub class_id: i32,
    /// Score after thresholding.
    pub confidence: f32,
    /// Human-readable class label when one is configured.
    pub class_name: Option<String>,
    /// Instance mask, for layouts that produce one.
    pub mask: Option<Mask>,
}

impl Detection {
    /// Creates a detection without label or mask.
    pub fn new(bbox: CornerBox, class_id: i32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
            class_name: None,
            mask: None,
        }
    }
}

/// Center-form candidate used by layouts that suppress before clamping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Box in the decoder's working space.
    pub bbox: CenterBox,
    /// Class index.
    pub class_id: i32,
    /// Candidate score.
    pub confidence: f32,
    /// Slot index of the soft-mask patch for masked layouts.
    pub mask_slot: Option<usize>,
}

impl Candidate {
    /// Creates a candidate without a mask slot.
    pub fn new(bbox: CenterBox, class_id: i32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
            mask_slot: None,
        }
    }
}

/// Per-image detection lists, outer index matching the inference batch.
pub type DetectionBatch = Vec<Vec<Detection>>;
