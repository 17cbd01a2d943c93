//! Store-side primitives.
//!
//! The store understands five value types: 64-bit integers, doubles,
//! timestamps, blobs and strings. Each has a null representation that
//! cannot collide with valid user data and exactly one point type
//! ([`Point`]) pairing it with a timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Store timestamp: seconds plus nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timespec {
    pub tv_sec: i64,
    pub tv_nsec: i64,
}

impl Timespec {
    /// Null timestamp. Both fields hold the minimum representable time.
    pub const NULL: Timespec = Timespec {
        tv_sec: i64::MIN,
        tv_nsec: i64::MIN,
    };

    pub const fn new(tv_sec: i64, tv_nsec: i64) -> Self {
        Timespec { tv_sec, tv_nsec }
    }

    /// Split a nanosecond count into seconds and a non-negative nanosecond part.
    pub const fn from_nanos(nanos: i64) -> Self {
        Timespec {
            tv_sec: nanos.div_euclid(NANOS_PER_SEC),
            tv_nsec: nanos.rem_euclid(NANOS_PER_SEC),
        }
    }

    /// Total nanoseconds. Widened to avoid overflow near the i64 limits.
    pub fn as_nanos(&self) -> i128 {
        self.tv_sec as i128 * NANOS_PER_SEC as i128 + self.tv_nsec as i128
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// The timestamp one nanosecond later.
    pub fn next_tick(&self) -> Self {
        if self.tv_nsec + 1 >= NANOS_PER_SEC {
            Timespec::new(self.tv_sec.saturating_add(1), self.tv_nsec + 1 - NANOS_PER_SEC)
        } else {
            Timespec::new(self.tv_sec, self.tv_nsec + 1)
        }
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NaT")
        } else {
            write!(f, "{}.{:09}", self.tv_sec, self.tv_nsec)
        }
    }
}

/// Half-open time interval `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub begin: Timespec,
    pub end: Timespec,
}

impl TimeRange {
    pub const fn new(begin: Timespec, end: Timespec) -> Self {
        TimeRange { begin, end }
    }

    /// The widest range the store accepts.
    pub const fn forever() -> Self {
        TimeRange {
            begin: Timespec::new(0, 0),
            end: Timespec::new(9_223_372_036, 854_775_807),
        }
    }

    pub fn contains(&self, ts: &Timespec) -> bool {
        self.begin <= *ts && *ts < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// A single timestamped value in the store's native representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Point<P> {
    pub timestamp: Timespec,
    pub value: P,
}

impl<P> Point<P> {
    pub fn new(timestamp: Timespec, value: P) -> Self {
        Point { timestamp, value }
    }
}

pub type Int64Point = Point<i64>;
pub type DoublePoint = Point<f64>;
pub type TimestampPoint = Point<Timespec>;
pub type BlobPoint = Point<Vec<u8>>;
pub type StringPoint = Point<String>;

/// Logical type of a table column as declared in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int64,
    Double,
    Timestamp,
    Blob,
    String,
    Symbol,
}

impl ColumnType {
    /// Type used on the wire. Symbol columns travel as strings.
    pub fn wire_type(&self) -> ColumnType {
        match self {
            ColumnType::Symbol => ColumnType::String,
            other => *other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int64 => write!(f, "int64"),
            ColumnType::Double => write!(f, "double"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Blob => write!(f, "blob"),
            ColumnType::String => write!(f, "string"),
            ColumnType::Symbol => write!(f, "symbol"),
        }
    }
}

/// Typed buffer holding one column's worth of store values.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveColumn {
    Int64(Vec<i64>),
    Double(Vec<f64>),
    Timestamp(Vec<Timespec>),
    Blob(Vec<Vec<u8>>),
    String(Vec<String>),
}

impl PrimitiveColumn {
    pub fn len(&self) -> usize {
        match self {
            PrimitiveColumn::Int64(v) => v.len(),
            PrimitiveColumn::Double(v) => v.len(),
            PrimitiveColumn::Timestamp(v) => v.len(),
            PrimitiveColumn::Blob(v) => v.len(),
            PrimitiveColumn::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            PrimitiveColumn::Int64(v) => v.clear(),
            PrimitiveColumn::Double(v) => v.clear(),
            PrimitiveColumn::Timestamp(v) => v.clear(),
            PrimitiveColumn::Blob(v) => v.clear(),
            PrimitiveColumn::String(v) => v.clear(),
        }
    }

    /// Number of null entries.
    pub fn null_count(&self) -> usize {
        match self {
            PrimitiveColumn::Int64(v) => v.iter().filter(|x| x.is_null()).count(),
            PrimitiveColumn::Double(v) => v.iter().filter(|x| x.is_null()).count(),
            PrimitiveColumn::Timestamp(v) => v.iter().filter(|x| x.is_null()).count(),
            PrimitiveColumn::Blob(v) => v.iter().filter(|x| x.is_null()).count(),
            PrimitiveColumn::String(v) => v.iter().filter(|x| x.is_null()).count(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            PrimitiveColumn::Int64(_) => ColumnType::Int64,
            PrimitiveColumn::Double(_) => ColumnType::Double,
            PrimitiveColumn::Timestamp(_) => ColumnType::Timestamp,
            PrimitiveColumn::Blob(_) => ColumnType::Blob,
            PrimitiveColumn::String(_) => ColumnType::String,
        }
    }
}

/// A value type the store can hold natively.
pub trait Primitive: Clone + PartialEq + fmt::Debug + 'static {
    /// Column type the primitive is stored under.
    const COLUMN_TYPE: ColumnType;

    fn null_value() -> Self;

    fn is_null(&self) -> bool;

    /// Wrap a buffer of values into the matching column variant.
    fn into_column(values: Vec<Self>) -> PrimitiveColumn;

    /// Borrow the values of a column if it holds this primitive.
    fn column_values(column: &PrimitiveColumn) -> Option<&[Self]>;
}

impl Primitive for i64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Int64;

    fn null_value() -> Self {
        i64::MIN
    }

    fn is_null(&self) -> bool {
        *self == i64::MIN
    }

    fn into_column(values: Vec<Self>) -> PrimitiveColumn {
        PrimitiveColumn::Int64(values)
    }

    fn column_values(column: &PrimitiveColumn) -> Option<&[Self]> {
        match column {
            PrimitiveColumn::Int64(v) => Some(v),
            _ => None,
        }
    }
}

impl Primitive for f64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Double;

    fn null_value() -> Self {
        f64::NAN
    }

    fn is_null(&self) -> bool {
        self.is_nan()
    }

    fn into_column(values: Vec<Self>) -> PrimitiveColumn {
        PrimitiveColumn::Double(values)
    }

    fn column_values(column: &PrimitiveColumn) -> Option<&[Self]> {
        match column {
            PrimitiveColumn::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl Primitive for Timespec {
    const COLUMN_TYPE: ColumnType = ColumnType::Timestamp;

    fn null_value() -> Self {
        Timespec::NULL
    }

    fn is_null(&self) -> bool {
        Timespec::is_null(self)
    }

    fn into_column(values: Vec<Self>) -> PrimitiveColumn {
        PrimitiveColumn::Timestamp(values)
    }

    fn column_values(column: &PrimitiveColumn) -> Option<&[Self]> {
        match column {
            PrimitiveColumn::Timestamp(v) => Some(v),
            _ => None,
        }
    }
}

impl Primitive for Vec<u8> {
    const COLUMN_TYPE: ColumnType = ColumnType::Blob;

    fn null_value() -> Self {
        Vec::new()
    }

    fn is_null(&self) -> bool {
        self.is_empty()
    }

    fn into_column(values: Vec<Self>) -> PrimitiveColumn {
        PrimitiveColumn::Blob(values)
    }

    fn column_values(column: &PrimitiveColumn) -> Option<&[Self]> {
        match column {
            PrimitiveColumn::Blob(v) => Some(v),
            _ => None,
        }
    }
}

impl Primitive for String {
    const COLUMN_TYPE: ColumnType = ColumnType::String;

    fn null_value() -> Self {
        String::new()
    }

    fn is_null(&self) -> bool {
        self.is_empty()
    }

    fn into_column(values: Vec<Self>) -> PrimitiveColumn {
        PrimitiveColumn::String(values)
    }

    fn column_values(column: &PrimitiveColumn) -> Option<&[Self]> {
        match column {
            PrimitiveColumn::String(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nanos_negative_keeps_nsec_positive() {
        let ts = Timespec::from_nanos(-1);
        assert_eq!(ts, Timespec::new(-1, 999_999_999));
        assert_eq!(ts.as_nanos(), -1);
    }

    #[test]
    fn test_next_tick_carries_into_seconds() {
        assert_eq!(Timespec::new(5, 10).next_tick(), Timespec::new(5, 11));
        assert_eq!(
            Timespec::new(5, 999_999_999).next_tick(),
            Timespec::new(6, 0)
        );
    }

    #[test]
    fn test_null_sentinels() {
        assert!(i64::null_value().is_null());
        assert!(f64::null_value().is_null());
        assert!(Timespec::null_value().is_null());
        assert!(<Vec<u8>>::null_value().is_null());
        assert!(String::null_value().is_null());
        assert!(!Timespec::new(0, 0).is_null());
        assert_eq!(Timespec::NULL.to_string(), "NaT");
    }

    #[test]
    fn test_range_is_half_open() {
        let range = TimeRange::new(Timespec::new(1, 0), Timespec::new(2, 0));
        assert!(range.contains(&Timespec::new(1, 0)));
        assert!(range.contains(&Timespec::new(1, 999_999_999)));
        assert!(!range.contains(&Timespec::new(2, 0)));
        assert!(!TimeRange::forever().is_empty());
    }

    #[test]
    fn test_symbol_travels_as_string() {
        assert_eq!(ColumnType::Symbol.wire_type(), ColumnType::String);
        assert_eq!(ColumnType::Blob.wire_type(), ColumnType::Blob);
    }

    #[test]
    fn test_column_round_trip_and_nulls() {
        let mut column = i64::into_column(vec![1, i64::MIN, 3]);
        assert_eq!(column.column_type(), ColumnType::Int64);
        assert_eq!(column.null_count(), 1);
        assert_eq!(i64::column_values(&column), Some(&[1, i64::MIN, 3][..]));
        assert!(f64::column_values(&column).is_none());
        column.clear();
        assert!(column.is_empty());
    }
}
