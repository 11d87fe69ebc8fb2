//! Error types for detpost.

use crate::tensor::DType;
use thiserror::Error;

/// Result alias for detpost operations.
pub type DetPostResult<T> = std::result::Result<T, DetPostError>;

/// Errors that fail a post-processing call.
///
/// Structural problems (missing tensors, bad shapes, bad thresholds) surface
/// here. Anomalies confined to a single detection are skipped instead.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DetPostError {
    /// A configuration or layout parameter is unusable.
    #[error("invalid parameter: {reason}")]
    InvalidParam { reason: &'static str },
    /// A tensor does not have the rank or extents the layout expects.
    #[error("tensor {tensor} has unexpected shape {shape:?}: {reason}")]
    InvalidShape {
        tensor: usize,
        shape: Vec<usize>,
        reason: &'static str,
    },
    /// A buffer is shorter than its declared shape.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A tensor carries a different element type than the layout expects.
    #[error("tensor {tensor} has dtype {got:?}, expected {expected:?}")]
    TypeMismatch {
        tensor: usize,
        expected: DType,
        got: DType,
    },
    /// A required tensor is absent from the input list.
    #[error("missing input tensor {index} (have {len}) for {context}")]
    MissingInput {
        index: usize,
        len: usize,
        context: &'static str,
    },
    /// Fewer per-image entries were supplied than images in the batch.
    #[error("{context}: need {needed} entries, got {got}")]
    OutOfRange {
        needed: usize,
        got: usize,
        context: &'static str,
    },
    /// A box is too small to carry a mask.
    #[error("invalid box extent {width}x{height}")]
    InvalidBox { width: i64, height: i64 },
}
