//! Runtime dtype to compile-time handler dispatch.
//!
//! Callers describe what to do with a (dtype, primitive) pair by
//! implementing [`DtypeVisitor`]. [`by_dtype`] inspects an array's runtime
//! descriptor and the target column type and instantiates exactly one
//! `visit::<D, P>()`.
//!
//! | Column type       | Accepted dtypes                        |
//! |-------------------|----------------------------------------|
//! | `int64`           | int16, int32, int64                    |
//! | `double`          | float32, float64                       |
//! | `timestamp`       | datetime64\[ns\], object               |
//! | `string`/`symbol` | unicode, bytestring, object            |
//! | `blob`            | bytestring, object                     |

use tsw_common::{Error, Result};

use crate::convert::IntoPrimitive;
use crate::dtype::{
    BytestringDtype, Datetime64NsDtype, DtypeDescriptor, Float32Dtype, Float64Dtype,
    Int16Dtype, Int32Dtype, Int64Dtype, ObjectDtype, UnicodeDtype,
};
use crate::primitive::{ColumnType, Primitive, Timespec};

/// Handler invoked with the dtype tag and store primitive selected at runtime.
pub trait DtypeVisitor {
    type Output;

    fn visit<D, P>(self) -> Result<Self::Output>
    where
        D: IntoPrimitive<P>,
        P: Primitive;
}

/// Handler invoked with the store primitive of a column type.
pub trait ColumnVisitor {
    type Output;

    fn visit<P: Primitive>(self) -> Self::Output;
}

/// Select the handler for an array of `dtype` headed for a `column_type` column.
pub fn by_dtype<V: DtypeVisitor>(
    dtype: DtypeDescriptor,
    column_type: ColumnType,
    visitor: V,
) -> Result<V::Output> {
    tracing::trace!(%dtype, %column_type, "dispatching conversion");

    use crate::dtype::DtypeKind as K;
    use crate::primitive::ColumnType as C;

    match (column_type, dtype.kind, dtype.itemsize) {
        (C::Int64, K::Int, 2) => visitor.visit::<Int16Dtype, i64>(),
        (C::Int64, K::Int, 4) => visitor.visit::<Int32Dtype, i64>(),
        (C::Int64, K::Int, 8) => visitor.visit::<Int64Dtype, i64>(),

        (C::Double, K::Float, 4) => visitor.visit::<Float32Dtype, f64>(),
        (C::Double, K::Float, 8) => visitor.visit::<Float64Dtype, f64>(),

        (C::Timestamp, K::Datetime, 8) => visitor.visit::<Datetime64NsDtype, Timespec>(),
        (C::Timestamp, K::Object, _) => visitor.visit::<ObjectDtype, Timespec>(),

        (C::String | C::Symbol, K::Unicode, _) => visitor.visit::<UnicodeDtype, String>(),
        (C::String | C::Symbol, K::Bytes, _) => visitor.visit::<BytestringDtype, String>(),
        (C::String | C::Symbol, K::Object, _) => visitor.visit::<ObjectDtype, String>(),

        (C::Blob, K::Bytes, _) => visitor.visit::<BytestringDtype, Vec<u8>>(),
        (C::Blob, K::Object, _) => visitor.visit::<ObjectDtype, Vec<u8>>(),

        _ => Err(Error::UnsupportedConversion {
            kind: dtype.kind.code().to_string(),
            itemsize: dtype.itemsize,
            column_type: column_type.to_string(),
        }),
    }
}

/// Select the handler for the store primitive of `column_type`.
pub fn by_column_type<V: ColumnVisitor>(column_type: ColumnType, visitor: V) -> V::Output {
    match column_type {
        ColumnType::Int64 => visitor.visit::<i64>(),
        ColumnType::Double => visitor.visit::<f64>(),
        ColumnType::Timestamp => visitor.visit::<Timespec>(),
        ColumnType::Blob => visitor.visit::<Vec<u8>>(),
        ColumnType::String | ColumnType::Symbol => visitor.visit::<String>(),
    }
}
