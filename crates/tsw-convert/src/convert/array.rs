//! Bulk converters between external arrays and store primitives.
//!
//! Both directions go through [`ItemConvert`], one impl per (dtype,
//! primitive) pair. Delegate dtypes widen into their target first and then
//! reuse the target's impl, so `int32` and `int64` share one converter.

use tsw_common::{Error, Result};

use crate::array::{Array, Object};
use crate::dtype::{
    BytestringDtype, Datetime64NsDtype, Delegate, Dtype, Float32Dtype, Float64Dtype, Int16Dtype,
    Int32Dtype, Int64Dtype, ObjectDtype, UnicodeDtype,
};
use crate::masked_array::MaskedArray;
use crate::primitive::{Primitive, PrimitiveColumn, Timespec};

use super::unicode::{clean_stride, utf32_to_string, utf8_to_string};
use super::value::{Convert, TryConvert};

/// External to store conversion of a whole masked array.
///
/// Masked rows come out as the primitive's null value.
pub trait IntoPrimitive<P: Primitive>: Dtype {
    fn into_primitive(array: &MaskedArray) -> Result<Vec<P>>;
}

/// Store to external conversion. The mask is derived from null values.
pub trait FromPrimitive<P: Primitive>: Dtype {
    fn from_primitive(values: &[P]) -> Result<MaskedArray>;
}

/// Per-item conversion for dtypes that map directly onto a primitive.
pub trait ItemConvert<P: Primitive>: Dtype {
    /// Convert one item (a full stride of code units).
    fn to_primitive(item: &[Self::Unit]) -> Result<P>;

    /// Build an array of this dtype from store values.
    fn from_values(values: &[P]) -> Result<Array>;
}

fn single<T: Clone>(item: &[T], null: T) -> T {
    item.first().cloned().unwrap_or(null)
}

impl ItemConvert<i64> for Int64Dtype {
    fn to_primitive(item: &[i64]) -> Result<i64> {
        Ok(single(item, i64::MIN).convert())
    }

    fn from_values(values: &[i64]) -> Result<Array> {
        Ok(Array::Int64(values.to_vec()))
    }
}

impl ItemConvert<f64> for Float64Dtype {
    fn to_primitive(item: &[f64]) -> Result<f64> {
        Ok(single(item, f64::NAN).convert())
    }

    fn from_values(values: &[f64]) -> Result<Array> {
        Ok(Array::Float64(values.to_vec()))
    }
}

impl ItemConvert<Timespec> for Datetime64NsDtype {
    fn to_primitive(item: &[i64]) -> Result<Timespec> {
        Ok(single(item, i64::MIN).convert())
    }

    fn from_values(values: &[Timespec]) -> Result<Array> {
        Ok(Array::Datetime64Ns(
            values.iter().map(Convert::<i64>::convert).collect(),
        ))
    }
}

impl ItemConvert<String> for UnicodeDtype {
    fn to_primitive(item: &[u32]) -> Result<String> {
        Ok(utf32_to_string(item))
    }

    fn from_values(values: &[String]) -> Result<Array> {
        Ok(Array::unicode_from_strs(values))
    }
}

impl ItemConvert<Vec<u8>> for BytestringDtype {
    fn to_primitive(item: &[u8]) -> Result<Vec<u8>> {
        Ok(clean_stride(item).to_vec())
    }

    fn from_values(values: &[Vec<u8>]) -> Result<Array> {
        Ok(Array::bytes_from_slices(values))
    }
}

impl ItemConvert<String> for BytestringDtype {
    fn to_primitive(item: &[u8]) -> Result<String> {
        let bytes = clean_stride(item);
        utf8_to_string(bytes).ok_or_else(|| {
            Error::IncompatibleType(format!(
                "byte string {bytes:?} is not valid UTF-8 and cannot be stored in a string column"
            ))
        })
    }

    fn from_values(values: &[String]) -> Result<Array> {
        Ok(Array::bytes_from_slices(values))
    }
}

macro_rules! object_item {
    ($($prim:ty),*) => {
        $(
            impl ItemConvert<$prim> for ObjectDtype {
                fn to_primitive(item: &[Object]) -> Result<$prim> {
                    single(item, Object::None).try_convert()
                }

                fn from_values(values: &[$prim]) -> Result<Array> {
                    Ok(Array::Object(
                        values.iter().map(Convert::<Object>::convert).collect(),
                    ))
                }
            }
        )*
    };
}

object_item!(Timespec, String, Vec<u8>);

macro_rules! direct {
    ($($dtype:ty => $prim:ty),* $(,)?) => {
        $(
            impl IntoPrimitive<$prim> for $dtype {
                fn into_primitive(array: &MaskedArray) -> Result<Vec<$prim>> {
                    let stride = array.data().stride();
                    let units = array.filled_null::<Self>()?;
                    units
                        .chunks(stride)
                        .map(<Self as ItemConvert<$prim>>::to_primitive)
                        .collect()
                }
            }

            impl FromPrimitive<$prim> for $dtype {
                fn from_primitive(values: &[$prim]) -> Result<MaskedArray> {
                    let array = <Self as ItemConvert<$prim>>::from_values(values)?;
                    MaskedArray::masked_null::<Self>(array)
                }
            }
        )*
    };
}

direct!(
    Int64Dtype => i64,
    Float64Dtype => f64,
    Datetime64NsDtype => Timespec,
    UnicodeDtype => String,
    BytestringDtype => Vec<u8>,
    BytestringDtype => String,
    ObjectDtype => Timespec,
    ObjectDtype => String,
    ObjectDtype => Vec<u8>,
);

macro_rules! delegated {
    ($($dtype:ty => $prim:ty),* $(,)?) => {
        $(
            impl IntoPrimitive<$prim> for $dtype {
                fn into_primitive(array: &MaskedArray) -> Result<Vec<$prim>> {
                    array
                        .filled_null::<Self>()?
                        .iter()
                        .map(|unit| {
                            let wide = <Self as Delegate>::widen(unit);
                            <<Self as Delegate>::Target as ItemConvert<$prim>>::to_primitive(
                                std::slice::from_ref(&wide),
                            )
                        })
                        .collect()
                }
            }

            impl FromPrimitive<$prim> for $dtype {
                fn from_primitive(values: &[$prim]) -> Result<MaskedArray> {
                    let wide = <<Self as Delegate>::Target as ItemConvert<$prim>>::from_values(values)?;
                    let narrow = <<Self as Delegate>::Target as Dtype>::expect_units(&wide)?
                        .iter()
                        .map(<Self as Delegate>::narrow)
                        .collect::<Result<Vec<_>>>()?;
                    MaskedArray::masked_null::<Self>(Self::to_array(narrow, 1))
                }
            }
        )*
    };
}

delegated!(
    Int16Dtype => i64,
    Int32Dtype => i64,
    Float32Dtype => f64,
);

/// Read a store column back as a masked array of its natural dtype.
///
/// Blobs come back as an object array of bytes since fixed-width byte
/// strings cannot hold embedded zeros.
pub fn column_to_masked(column: &PrimitiveColumn) -> Result<MaskedArray> {
    match column {
        PrimitiveColumn::Int64(v) => Int64Dtype::from_primitive(v),
        PrimitiveColumn::Double(v) => Float64Dtype::from_primitive(v),
        PrimitiveColumn::Timestamp(v) => Datetime64NsDtype::from_primitive(v),
        PrimitiveColumn::Blob(v) => <ObjectDtype as FromPrimitive<Vec<u8>>>::from_primitive(v),
        PrimitiveColumn::String(v) => UnicodeDtype::from_primitive(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{Mask, MaskProbe};

    fn masked(data: Array, bits: Vec<bool>) -> MaskedArray {
        MaskedArray::new(data, Mask::new(bits)).unwrap()
    }

    #[test]
    fn test_int32_widens_and_keeps_nulls() {
        let arr = masked(Array::Int32(vec![1, 2, 3]), vec![false, true, false]);
        let out: Vec<i64> = Int32Dtype::into_primitive(&arr).unwrap();
        assert_eq!(out, vec![1, i64::MIN, 3]);
    }

    #[test]
    fn test_int16_round_trip() {
        let arr = masked(Array::Int16(vec![-5, 0, 7]), vec![false, false, true]);
        let store: Vec<i64> = Int16Dtype::into_primitive(&arr).unwrap();
        let back = <Int16Dtype as FromPrimitive<i64>>::from_primitive(&store).unwrap();
        assert_eq!(back.data(), &Array::Int16(vec![-5, 0, i16::MIN]));
        assert_eq!(back.mask().bits(), &[false, false, true]);
    }

    #[test]
    fn test_float32_round_trip() {
        let arr = masked(Array::Float32(vec![0.25, 9.0]), vec![true, false]);
        let store: Vec<f64> = Float32Dtype::into_primitive(&arr).unwrap();
        assert!(store[0].is_nan());
        let back = <Float32Dtype as FromPrimitive<f64>>::from_primitive(&store).unwrap();
        assert_eq!(back.mask().bits(), &[true, false]);
    }

    #[test]
    fn test_narrowing_overflow_is_incompatible() {
        let err = <Int32Dtype as FromPrimitive<i64>>::from_primitive(&[i64::MAX]).unwrap_err();
        assert!(matches!(err, Error::IncompatibleType(_)));
    }

    #[test]
    fn test_datetime_to_timespec() {
        let arr = MaskedArray::from_array(Array::Datetime64Ns(vec![1_500_000_000, i64::MIN]));
        let out: Vec<Timespec> = Datetime64NsDtype::into_primitive(&arr).unwrap();
        assert_eq!(out[0], Timespec::new(1, 500_000_000));
        assert!(out[1].is_null());
    }

    #[test]
    fn test_unicode_to_string_with_mask() {
        let arr = masked(Array::unicode_from_strs(&["caf\u{e9}", "x"]), vec![false, true]);
        let out: Vec<String> = UnicodeDtype::into_primitive(&arr).unwrap();
        assert_eq!(out, vec!["caf\u{e9}".to_string(), String::new()]);
    }

    #[test]
    fn test_bytestring_to_blob_trims_padding() {
        let items: Vec<&[u8]> = vec![&b"abc"[..], &b"d"[..]];
        let arr = MaskedArray::from_array(Array::bytes_from_slices(&items));
        let out: Vec<Vec<u8>> = BytestringDtype::into_primitive(&arr).unwrap();
        assert_eq!(out, vec![b"abc".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn test_bytestring_to_string_rejects_bad_utf8() {
        let items: Vec<&[u8]> = vec![&[0xFFu8, 0x41][..]];
        let arr = MaskedArray::from_array(Array::bytes_from_slices(&items));
        let res: Result<Vec<String>> = BytestringDtype::into_primitive(&arr);
        assert!(matches!(res, Err(Error::IncompatibleType(_))));
    }

    #[test]
    fn test_object_blob_and_none() {
        let arr = MaskedArray::from_array(Array::Object(vec![
            Object::Bytes(vec![1, 0, 2]),
            Object::None,
        ]));
        let out: Vec<Vec<u8>> = ObjectDtype::into_primitive(&arr).unwrap();
        assert_eq!(out, vec![vec![1, 0, 2], Vec::new()]);
    }

    #[test]
    fn test_object_wrong_element_type() {
        let arr = MaskedArray::from_array(Array::Object(vec![Object::Float(1.0)]));
        let res: Result<Vec<Timespec>> = ObjectDtype::into_primitive(&arr);
        assert!(matches!(res, Err(Error::IncompatibleType(_))));
    }

    #[test]
    fn test_column_to_masked_natural_dtypes() {
        let ints = column_to_masked(&PrimitiveColumn::Int64(vec![1, i64::MIN])).unwrap();
        assert_eq!(ints.probe(), MaskProbe::Mixed);

        let strings =
            column_to_masked(&PrimitiveColumn::String(vec!["a".into(), "bc".into()])).unwrap();
        assert_eq!(
            strings.data().to_strings().unwrap(),
            vec!["a".to_string(), "bc".to_string()]
        );

        let blobs = column_to_masked(&PrimitiveColumn::Blob(vec![Vec::new()])).unwrap();
        assert_eq!(blobs.probe(), MaskProbe::AllNull);
    }
}
