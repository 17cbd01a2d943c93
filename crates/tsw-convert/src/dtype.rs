//! Type descriptor registry.
//!
//! [`DtypeDescriptor`] is the runtime view of an external buffer's element
//! encoding (kind plus width). The [`Dtype`] trait is its compile-time
//! counterpart: one zero-sized tag per supported encoding, carrying the
//! code unit type, the null sentinel and access to the matching [`Array`]
//! variant.

use std::fmt;

use tsw_common::{Error, Result};

use crate::array::{Array, Object};
use crate::convert::value::Convert;

/// Element kind, following the usual single-character dtype codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtypeKind {
    Bool,
    Int,
    UInt,
    Float,
    Datetime,
    Bytes,
    Unicode,
    Object,
}

impl DtypeKind {
    pub fn code(&self) -> char {
        match self {
            DtypeKind::Bool => 'b',
            DtypeKind::Int => 'i',
            DtypeKind::UInt => 'u',
            DtypeKind::Float => 'f',
            DtypeKind::Datetime => 'M',
            DtypeKind::Bytes => 'S',
            DtypeKind::Unicode => 'U',
            DtypeKind::Object => 'O',
        }
    }
}

/// Runtime description of an array's element encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DtypeDescriptor {
    pub kind: DtypeKind,
    /// Bytes per item. For unicode this is four bytes per code unit.
    pub itemsize: usize,
}

impl DtypeDescriptor {
    pub const fn new(kind: DtypeKind, itemsize: usize) -> Self {
        DtypeDescriptor { kind, itemsize }
    }
}

impl fmt::Display for DtypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DtypeKind::Bool => write!(f, "bool"),
            DtypeKind::Int => write!(f, "int{}", self.itemsize * 8),
            DtypeKind::UInt => write!(f, "uint{}", self.itemsize * 8),
            DtypeKind::Float => write!(f, "float{}", self.itemsize * 8),
            DtypeKind::Datetime => write!(f, "datetime64[ns]"),
            DtypeKind::Bytes => write!(f, "|S{}", self.itemsize),
            DtypeKind::Unicode => write!(f, "<U{}", self.itemsize / 4),
            DtypeKind::Object => write!(f, "object"),
        }
    }
}

/// Compile-time tag for one external encoding.
pub trait Dtype: Sized + 'static {
    const KIND: DtypeKind;
    const NAME: &'static str;
    /// Bytes per code unit.
    const UNIT_SIZE: usize;
    /// Items span a caller-chosen number of code units.
    const VARIABLE_WIDTH: bool = false;

    type Unit: Clone + PartialEq + fmt::Debug;

    /// Code unit used to fill a null item.
    fn null_unit() -> Self::Unit;

    /// Whether one item (a full stride of code units) is the null sentinel.
    fn is_null(item: &[Self::Unit]) -> bool;

    /// Borrow the code units of an array holding this encoding.
    fn units(array: &Array) -> Option<&[Self::Unit]>;

    /// Wrap code units back into an array with the given stride.
    fn to_array(units: Vec<Self::Unit>, stride: usize) -> Array;

    /// Code units per item for a descriptor of this kind.
    fn stride_size(itemsize: usize) -> usize {
        if Self::VARIABLE_WIDTH {
            (itemsize / Self::UNIT_SIZE).max(1)
        } else {
            1
        }
    }

    fn matches(dtype: &DtypeDescriptor) -> bool {
        dtype.kind == Self::KIND && (Self::VARIABLE_WIDTH || dtype.itemsize == Self::UNIT_SIZE)
    }

    /// Borrow the code units or fail with a type error naming both sides.
    fn expect_units(array: &Array) -> Result<&[Self::Unit]> {
        Self::units(array).ok_or_else(|| {
            Error::IncompatibleType(format!(
                "expected {} array, got {}",
                Self::NAME,
                array.dtype()
            ))
        })
    }
}

/// An encoding stored through a wider one.
///
/// Narrower integers and floats are widened to their 64-bit counterpart
/// before conversion so a single converter per store type suffices.
pub trait Delegate: Dtype {
    type Target: Dtype;

    fn widen(unit: &Self::Unit) -> <Self::Target as Dtype>::Unit;

    fn narrow(unit: &<Self::Target as Dtype>::Unit) -> Result<Self::Unit>;
}

macro_rules! fixed_dtype {
    ($tag:ident, $unit:ty, $kind:expr, $name:literal, $variant:ident, $null:expr, |$u:ident| $is_null:expr) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $tag;

        impl Dtype for $tag {
            const KIND: DtypeKind = $kind;
            const NAME: &'static str = $name;
            const UNIT_SIZE: usize = std::mem::size_of::<$unit>();

            type Unit = $unit;

            fn null_unit() -> $unit {
                $null
            }

            fn is_null(item: &[$unit]) -> bool {
                match item.first() {
                    Some($u) => $is_null,
                    None => true,
                }
            }

            fn units(array: &Array) -> Option<&[$unit]> {
                match array {
                    Array::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn to_array(units: Vec<$unit>, _stride: usize) -> Array {
                Array::$variant(units)
            }
        }
    };
}

fixed_dtype!(Int16Dtype, i16, DtypeKind::Int, "int16", Int16, i16::MIN, |u| *u == i16::MIN);
fixed_dtype!(Int32Dtype, i32, DtypeKind::Int, "int32", Int32, i32::MIN, |u| *u == i32::MIN);
fixed_dtype!(Int64Dtype, i64, DtypeKind::Int, "int64", Int64, i64::MIN, |u| *u == i64::MIN);
fixed_dtype!(Float32Dtype, f32, DtypeKind::Float, "float32", Float32, f32::NAN, |u| u.is_nan());
fixed_dtype!(Float64Dtype, f64, DtypeKind::Float, "float64", Float64, f64::NAN, |u| u.is_nan());
fixed_dtype!(
    Datetime64NsDtype,
    i64,
    DtypeKind::Datetime,
    "datetime64[ns]",
    Datetime64Ns,
    i64::MIN,
    |u| *u == i64::MIN
);

/// Opaque object array. Null is `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectDtype;

impl Dtype for ObjectDtype {
    const KIND: DtypeKind = DtypeKind::Object;
    const NAME: &'static str = "object";
    const UNIT_SIZE: usize = 8;

    type Unit = Object;

    fn null_unit() -> Object {
        Object::None
    }

    fn is_null(item: &[Object]) -> bool {
        item.first().map_or(true, Object::is_none)
    }

    fn units(array: &Array) -> Option<&[Object]> {
        match array {
            Array::Object(v) => Some(v),
            _ => None,
        }
    }

    fn to_array(units: Vec<Object>, _stride: usize) -> Array {
        Array::Object(units)
    }

    fn matches(dtype: &DtypeDescriptor) -> bool {
        dtype.kind == DtypeKind::Object
    }
}

/// Fixed-width byte strings. An item whose first byte is zero is null.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytestringDtype;

impl Dtype for BytestringDtype {
    const KIND: DtypeKind = DtypeKind::Bytes;
    const NAME: &'static str = "bytestring";
    const UNIT_SIZE: usize = 1;
    const VARIABLE_WIDTH: bool = true;

    type Unit = u8;

    fn null_unit() -> u8 {
        0
    }

    fn is_null(item: &[u8]) -> bool {
        item.first().map_or(true, |u| *u == 0)
    }

    fn units(array: &Array) -> Option<&[u8]> {
        match array {
            Array::Bytes { data, .. } => Some(data),
            _ => None,
        }
    }

    fn to_array(units: Vec<u8>, stride: usize) -> Array {
        Array::Bytes {
            data: units,
            width: stride.max(1),
        }
    }
}

/// Fixed-width UTF-32 strings. An item whose first code unit is zero is null.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeDtype;

impl Dtype for UnicodeDtype {
    const KIND: DtypeKind = DtypeKind::Unicode;
    const NAME: &'static str = "unicode";
    const UNIT_SIZE: usize = 4;
    const VARIABLE_WIDTH: bool = true;

    type Unit = u32;

    fn null_unit() -> u32 {
        0
    }

    fn is_null(item: &[u32]) -> bool {
        item.first().map_or(true, |u| *u == 0)
    }

    fn units(array: &Array) -> Option<&[u32]> {
        match array {
            Array::Unicode { data, .. } => Some(data),
            _ => None,
        }
    }

    fn to_array(units: Vec<u32>, stride: usize) -> Array {
        Array::Unicode {
            data: units,
            width: stride.max(1),
        }
    }
}

macro_rules! delegate_dtype {
    ($tag:ident => $target:ident, $narrow:expr) => {
        impl Delegate for $tag {
            type Target = $target;

            fn widen(unit: &Self::Unit) -> <$target as Dtype>::Unit {
                if Self::is_null(std::slice::from_ref(unit)) {
                    $target::null_unit()
                } else {
                    unit.convert()
                }
            }

            fn narrow(unit: &<$target as Dtype>::Unit) -> Result<Self::Unit> {
                if $target::is_null(std::slice::from_ref(unit)) {
                    return Ok(Self::null_unit());
                }
                let narrow: fn(&<$target as Dtype>::Unit) -> Option<Self::Unit> = $narrow;
                narrow(unit).ok_or_else(|| {
                    Error::IncompatibleType(format!(
                        "value {:?} does not fit in {}",
                        unit,
                        Self::NAME
                    ))
                })
            }
        }
    };
}

delegate_dtype!(Int16Dtype => Int64Dtype, |v| i16::try_from(*v).ok());
delegate_dtype!(Int32Dtype => Int64Dtype, |v| i32::try_from(*v).ok());
// Finite values outside the f32 range are rejected rather than turned into infinities.
delegate_dtype!(Float32Dtype => Float64Dtype, |v| {
    let narrow = *v as f32;
    (narrow.is_finite() || !v.is_finite()).then_some(narrow)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_display() {
        assert_eq!(DtypeDescriptor::new(DtypeKind::Int, 2).to_string(), "int16");
        assert_eq!(DtypeDescriptor::new(DtypeKind::Unicode, 20).to_string(), "<U5");
        assert_eq!(DtypeDescriptor::new(DtypeKind::Bytes, 3).to_string(), "|S3");
        assert_eq!(DtypeKind::Datetime.code(), 'M');
    }

    #[test]
    fn test_matches_checks_width_for_fixed_types_only() {
        assert!(Int32Dtype::matches(&DtypeDescriptor::new(DtypeKind::Int, 4)));
        assert!(!Int32Dtype::matches(&DtypeDescriptor::new(DtypeKind::Int, 8)));
        assert!(UnicodeDtype::matches(&DtypeDescriptor::new(DtypeKind::Unicode, 40)));
        assert!(ObjectDtype::matches(&DtypeDescriptor::new(DtypeKind::Object, 8)));
    }

    #[test]
    fn test_stride_size() {
        assert_eq!(UnicodeDtype::stride_size(20), 5);
        assert_eq!(BytestringDtype::stride_size(7), 7);
        assert_eq!(Int64Dtype::stride_size(8), 1);
    }

    #[test]
    fn test_null_sentinels() {
        assert!(Int16Dtype::is_null(&[i16::MIN]));
        assert!(!Int16Dtype::is_null(&[0]));
        assert!(Float32Dtype::is_null(&[f32::NAN]));
        assert!(Datetime64NsDtype::is_null(&[i64::MIN]));
        assert!(UnicodeDtype::is_null(&[0, 0, 0]));
        assert!(!UnicodeDtype::is_null(&[b'a' as u32, 0]));
        assert!(ObjectDtype::is_null(&[Object::None]));
    }

    #[test]
    fn test_delegate_widen_preserves_null() {
        assert_eq!(Int32Dtype::widen(&i32::MIN), i64::MIN);
        assert_eq!(Int32Dtype::widen(&-7), -7i64);
        assert!(Float32Dtype::widen(&f32::NAN).is_nan());
        assert_eq!(Float32Dtype::widen(&1.5), 1.5f64);
    }

    #[test]
    fn test_delegate_narrow() {
        assert_eq!(Int16Dtype::narrow(&i64::MIN).unwrap(), i16::MIN);
        assert_eq!(Int16Dtype::narrow(&12).unwrap(), 12);
        assert!(matches!(
            Int16Dtype::narrow(&100_000),
            Err(Error::IncompatibleType(_))
        ));
    }

    #[test]
    fn test_float32_narrow_rejects_out_of_range() {
        assert_eq!(Float32Dtype::narrow(&1.5).unwrap(), 1.5f32);
        assert!(Float32Dtype::narrow(&f64::NAN).unwrap().is_nan());
        assert_eq!(Float32Dtype::narrow(&f64::INFINITY).unwrap(), f32::INFINITY);
        assert!(matches!(
            Float32Dtype::narrow(&1e300),
            Err(Error::IncompatibleType(_))
        ));
        assert!(matches!(
            Float32Dtype::narrow(&-1e39),
            Err(Error::IncompatibleType(_))
        ));
    }

    #[test]
    fn test_expect_units_reports_both_types() {
        let err = Int64Dtype::expect_units(&Array::Float64(vec![1.0])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "incompatible type: expected int64 array, got float64"
        );
    }
}
