//! External columnar arrays.
//!
//! [`Array`] is the caller-facing buffer type. Fixed-width variants hold
//! one element per row. The variable-width variants (`Bytes`, `Unicode`)
//! hold a single contiguous buffer of `len * width` code units with every
//! item right-padded with zeros to the widest item.

use tsw_common::{Error, Result};

use crate::convert::unicode::{utf32_to_string, utf8_to_utf32};
use crate::dtype::{DtypeDescriptor, DtypeKind};

/// Element of an opaque object array.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Object {
    pub fn is_none(&self) -> bool {
        matches!(self, Object::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::None => "None",
            Object::Int(_) => "int",
            Object::Float(_) => "float",
            Object::Str(_) => "str",
            Object::Bytes(_) => "bytes",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// Nanoseconds since the epoch, `i64::MIN` is NaT.
    Datetime64Ns(Vec<i64>),
    /// Fixed-width byte strings, `width` bytes per item.
    Bytes { data: Vec<u8>, width: usize },
    /// Fixed-width UTF-32 strings, `width` code units per item.
    Unicode { data: Vec<u32>, width: usize },
    Object(Vec<Object>),
}

impl Array {
    /// Build a unicode array from UTF-8 strings.
    pub fn unicode_from_strs<S: AsRef<str>>(items: &[S]) -> Self {
        let encoded: Vec<Vec<u32>> = items.iter().map(|s| utf8_to_utf32(s.as_ref())).collect();
        let width = encoded.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut data = Vec::with_capacity(width * encoded.len());
        for item in &encoded {
            data.extend_from_slice(item);
            data.resize(data.len() + width - item.len(), 0);
        }
        Array::Unicode { data, width }
    }

    /// Build a fixed-width byte string array.
    pub fn bytes_from_slices<B: AsRef<[u8]>>(items: &[B]) -> Self {
        let width = items
            .iter()
            .map(|b| b.as_ref().len())
            .max()
            .unwrap_or(0)
            .max(1);
        let mut data = Vec::with_capacity(width * items.len());
        for item in items {
            let item = item.as_ref();
            data.extend_from_slice(item);
            data.resize(data.len() + width - item.len(), 0);
        }
        Array::Bytes { data, width }
    }

    /// Decode a unicode array back into strings, trimming the zero padding.
    pub fn to_strings(&self) -> Option<Vec<String>> {
        match self {
            Array::Unicode { data, width } => Some(
                data.chunks((*width).max(1))
                    .map(utf32_to_string)
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn dtype(&self) -> DtypeDescriptor {
        match self {
            Array::Bool(_) => DtypeDescriptor::new(DtypeKind::Bool, 1),
            Array::Int8(_) => DtypeDescriptor::new(DtypeKind::Int, 1),
            Array::Int16(_) => DtypeDescriptor::new(DtypeKind::Int, 2),
            Array::Int32(_) => DtypeDescriptor::new(DtypeKind::Int, 4),
            Array::Int64(_) => DtypeDescriptor::new(DtypeKind::Int, 8),
            Array::UInt8(_) => DtypeDescriptor::new(DtypeKind::UInt, 1),
            Array::UInt16(_) => DtypeDescriptor::new(DtypeKind::UInt, 2),
            Array::UInt32(_) => DtypeDescriptor::new(DtypeKind::UInt, 4),
            Array::UInt64(_) => DtypeDescriptor::new(DtypeKind::UInt, 8),
            Array::Float32(_) => DtypeDescriptor::new(DtypeKind::Float, 4),
            Array::Float64(_) => DtypeDescriptor::new(DtypeKind::Float, 8),
            Array::Datetime64Ns(_) => DtypeDescriptor::new(DtypeKind::Datetime, 8),
            Array::Bytes { width, .. } => DtypeDescriptor::new(DtypeKind::Bytes, *width),
            Array::Unicode { width, .. } => DtypeDescriptor::new(DtypeKind::Unicode, width * 4),
            Array::Object(_) => DtypeDescriptor::new(DtypeKind::Object, 8),
        }
    }

    /// Code units per item.
    pub fn stride(&self) -> usize {
        match self {
            Array::Bytes { width, .. } | Array::Unicode { width, .. } => (*width).max(1),
            _ => 1,
        }
    }

    /// Fail if a fixed-width buffer ends in a partial item.
    pub fn check_stride(&self) -> Result<()> {
        let units = match self {
            Array::Bytes { data, .. } => data.len(),
            Array::Unicode { data, .. } => data.len(),
            _ => return Ok(()),
        };
        let width = self.stride();
        if units % width != 0 {
            return Err(Error::InvalidArgument(format!(
                "{} buffer of {units} code units is not a whole number of width {width} items",
                self.dtype()
            )));
        }
        Ok(())
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        match self {
            Array::Bool(v) => v.len(),
            Array::Int8(v) => v.len(),
            Array::Int16(v) => v.len(),
            Array::Int32(v) => v.len(),
            Array::Int64(v) => v.len(),
            Array::UInt8(v) => v.len(),
            Array::UInt16(v) => v.len(),
            Array::UInt32(v) => v.len(),
            Array::UInt64(v) => v.len(),
            Array::Float32(v) => v.len(),
            Array::Float64(v) => v.len(),
            Array::Datetime64Ns(v) => v.len(),
            Array::Bytes { data, .. } => data.len() / self.stride(),
            Array::Unicode { data, .. } => data.len() / self.stride(),
            Array::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
