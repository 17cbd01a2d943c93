//! Point converters: separate timestamp and value sequences to and from
//! `(timestamp, value)` records.

use tsw_common::{Error, Result};

use crate::array::Array;
use crate::dtype::{Datetime64NsDtype, Dtype};
use crate::masked_array::MaskedArray;
use crate::primitive::{Point, Primitive, Timespec};

use super::array::{FromPrimitive, IntoPrimitive};
use super::value::Convert;

/// Zip a datetime64[ns] index with a value array into store points.
pub fn point_array<D, P>(timestamps: &Array, values: &MaskedArray) -> Result<Vec<Point<P>>>
where
    D: IntoPrimitive<P>,
    P: Primitive,
{
    let index = Datetime64NsDtype::expect_units(timestamps)?;
    if index.len() != values.len() {
        return Err(Error::LengthMismatch {
            what: "point values".to_string(),
            expected: index.len(),
            actual: values.len(),
        });
    }
    if index.is_empty() {
        return Ok(Vec::new());
    }

    let converted = D::into_primitive(values)?;
    Ok(index
        .iter()
        .zip(converted)
        .map(|(ns, value)| Point::new(ns.convert(), value))
        .collect())
}

/// Split store points back into a datetime64[ns] index and a value array.
pub fn split_points<D, P>(points: &[Point<P>]) -> Result<(Array, MaskedArray)>
where
    D: FromPrimitive<P>,
    P: Primitive,
{
    let index: Vec<i64> = points
        .iter()
        .map(|p| Convert::<i64>::convert(&p.timestamp))
        .collect();
    let values: Vec<P> = points.iter().map(|p| p.value.clone()).collect();
    let values = D::from_primitive(&values)?;
    Ok((Array::Datetime64Ns(index), values))
}

/// Timestamps of a point sequence.
pub fn point_timestamps<P>(points: &[Point<P>]) -> Vec<Timespec> {
    points.iter().map(|p| p.timestamp).collect()
}
