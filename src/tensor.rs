//! Borrowed host tensors.
//!
//! A [`TensorView`] pairs a typed slice with its shape. Construction checks
//! that the buffer really holds `product(shape)` elements; decoders still read
//! through `get` so a wrong index can only skip a value, never panic.

use crate::util::{DetPostError, DetPostResult};
use half::f16;

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    /// 32-bit float.
    F32,
    /// 16-bit IEEE half float.
    F16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// Boolean.
    Bool,
}

/// Typed borrowed buffer.
#[derive(Clone, Copy, Debug)]
pub enum TensorData<'a> {
    /// 32-bit floats.
    F32(&'a [f32]),
    /// Half floats.
    F16(&'a [f16]),
    /// 32-bit integers.
    I32(&'a [i32]),
    /// 64-bit integers.
    I64(&'a [i64]),
    /// Booleans.
    Bool(&'a [bool]),
}

impl<'a> TensorData<'a> {
    /// Element type of the buffer.
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F16(_) => DType::F16,
            TensorData::I32(_) => DType::I32,
            TensorData::I64(_) => DType::I64,
            TensorData::Bool(_) => DType::Bool,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(d) => d.len(),
            TensorData::F16(d) => d.len(),
            TensorData::I32(d) => d.len(),
            TensorData::I64(d) => d.len(),
            TensorData::Bool(d) => d.len(),
        }
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice(&self, start: usize, end: usize) -> Option<TensorData<'a>> {
        Some(match *self {
            TensorData::F32(d) => TensorData::F32(d.get(start..end)?),
            TensorData::F16(d) => TensorData::F16(d.get(start..end)?),
            TensorData::I32(d) => TensorData::I32(d.get(start..end)?),
            TensorData::I64(d) => TensorData::I64(d.get(start..end)?),
            TensorData::Bool(d) => TensorData::Bool(d.get(start..end)?),
        })
    }

    /// Reads element `idx` as `f32`, widening half floats and integers.
    pub fn f32_at(&self, idx: usize) -> Option<f32> {
        match self {
            TensorData::F32(d) => d.get(idx).copied(),
            TensorData::F16(d) => d.get(idx).map(|v| v.to_f32()),
            TensorData::I32(d) => d.get(idx).map(|&v| v as f32),
            TensorData::I64(d) => d.get(idx).map(|&v| v as f32),
            TensorData::Bool(d) => d.get(idx).map(|&v| if v { 1.0 } else { 0.0 }),
        }
    }

    /// Reads element `idx` as an integer, truncating floats toward zero.
    pub fn i64_at(&self, idx: usize) -> Option<i64> {
        match self {
            TensorData::F32(d) => d.get(idx).map(|&v| v as i64),
            TensorData::F16(d) => d.get(idx).map(|v| v.to_f32() as i64),
            TensorData::I32(d) => d.get(idx).map(|&v| i64::from(v)),
            TensorData::I64(d) => d.get(idx).copied(),
            TensorData::Bool(d) => d.get(idx).map(|&v| i64::from(v)),
        }
    }

    /// Reads element `idx` as a flag; numeric values are true when non-zero.
    pub fn bool_at(&self, idx: usize) -> Option<bool> {
        match self {
            TensorData::Bool(d) => d.get(idx).copied(),
            _ => self.i64_at(idx).map(|v| v != 0),
        }
    }
}

/// Borrowed tensor: typed buffer plus shape, batch dimension first.
#[derive(Clone, Copy, Debug)]
pub struct TensorView<'a> {
    data: TensorData<'a>,
    shape: &'a [usize],
}

impl<'a> TensorView<'a> {
    /// Creates a view, checking that the buffer covers the shape.
    pub fn new(data: TensorData<'a>, shape: &'a [usize]) -> DetPostResult<Self> {
        let needed = element_count(shape)?;
        if data.len() < needed {
            return Err(DetPostError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// Convenience constructor for `f32` tensors.
    pub fn from_f32(data: &'a [f32], shape: &'a [usize]) -> DetPostResult<Self> {
        Self::new(TensorData::F32(data), shape)
    }

    /// Convenience constructor for half-float tensors.
    pub fn from_f16(data: &'a [f16], shape: &'a [usize]) -> DetPostResult<Self> {
        Self::new(TensorData::F16(data), shape)
    }

    /// Convenience constructor for `i32` tensors.
    pub fn from_i32(data: &'a [i32], shape: &'a [usize]) -> DetPostResult<Self> {
        Self::new(TensorData::I32(data), shape)
    }

    /// Convenience constructor for `i64` tensors.
    pub fn from_i64(data: &'a [i64], shape: &'a [usize]) -> DetPostResult<Self> {
        Self::new(TensorData::I64(data), shape)
    }

    /// Convenience constructor for boolean tensors.
    pub fn from_bool(data: &'a [bool], shape: &'a [usize]) -> DetPostResult<Self> {
        Self::new(TensorData::Bool(data), shape)
    }

    /// The tensor's shape.
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    /// The element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// The whole buffer.
    pub fn data(&self) -> TensorData<'a> {
        self.data
    }

    /// Size of the leading (batch) dimension; zero for a rank-0 shape.
    pub fn batch_size(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Elements per image: the product of all dimensions after the first.
    pub fn image_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Returns the slice belonging to image `index`.
    pub fn image(&self, index: usize) -> Option<TensorData<'a>> {
        if index >= self.batch_size() {
            return None;
        }
        let stride = self.image_len();
        let start = index.checked_mul(stride)?;
        let end = start.checked_add(stride)?;
        self.data.slice(start, end)
    }
}

fn element_count(shape: &[usize]) -> DetPostResult<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| {
        acc.checked_mul(dim).ok_or(DetPostError::InvalidParam {
            reason: "tensor shape overflows usize",
        })
    })
}
