//! Scalar value converters.
//!
//! Every converter maps nulls to nulls without running the general-case
//! transform, so a NaT never goes through timezone correction and a null
//! timestamp never turns into an epoch offset.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use tsw_common::{Error, Result};

use crate::array::Object;
use crate::primitive::{TimeRange, Timespec};

/// Infallible conversion from `Self` into `T`.
pub trait Convert<T> {
    fn convert(&self) -> T;
}

/// Fallible conversion, used for opaque object values.
pub trait TryConvert<T> {
    fn try_convert(&self) -> Result<T>;
}

macro_rules! identity {
    ($($t:ty),*) => {
        $(
            impl Convert<$t> for $t {
                fn convert(&self) -> $t {
                    self.clone()
                }
            }
        )*
    };
}

identity!(i64, f64, Timespec, String, Vec<u8>);

macro_rules! widening {
    ($src:ty => $dst:ty) => {
        const _: () = assert!(std::mem::size_of::<$src>() <= std::mem::size_of::<$dst>());

        impl Convert<$dst> for $src {
            fn convert(&self) -> $dst {
                <$dst>::from(*self)
            }
        }
    };
}

widening!(i16 => i64);
widening!(i32 => i64);
widening!(f32 => f64);

/// datetime64[ns] nanoseconds to a store timestamp. NaT becomes the null timestamp.
impl Convert<Timespec> for i64 {
    fn convert(&self) -> Timespec {
        if *self == i64::MIN {
            Timespec::NULL
        } else {
            Timespec::from_nanos(*self)
        }
    }
}

/// Store timestamp to datetime64[ns]. Out-of-range values saturate.
impl Convert<i64> for Timespec {
    fn convert(&self) -> i64 {
        if self.is_null() {
            return i64::MIN;
        }
        let nanos = self.as_nanos();
        // i64::MIN is NaT, so the lowest valid value is one above it.
        nanos.clamp(i64::MIN as i128 + 1, i64::MAX as i128) as i64
    }
}

impl<Tz: TimeZone> Convert<Timespec> for Option<DateTime<Tz>> {
    fn convert(&self) -> Timespec {
        match self {
            None => Timespec::NULL,
            Some(dt) => {
                let utc = dt.with_timezone(&Utc);
                Timespec::new(utc.timestamp(), i64::from(utc.timestamp_subsec_nanos()))
            }
        }
    }
}

/// A wall-clock value without a zone is interpreted in the local zone.
impl Convert<Timespec> for Option<NaiveDateTime> {
    fn convert(&self) -> Timespec {
        match self {
            None => Timespec::NULL,
            Some(naive) => {
                let local = Local
                    .from_local_datetime(naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| naive.and_utc());
                Some(local).convert()
            }
        }
    }
}

impl Convert<Option<DateTime<Utc>>> for Timespec {
    fn convert(&self) -> Option<DateTime<Utc>> {
        if self.is_null() {
            return None;
        }
        let nsec = u32::try_from(self.tv_nsec).ok()?;
        DateTime::from_timestamp(self.tv_sec, nsec)
    }
}

impl Convert<TimeRange> for (Timespec, Timespec) {
    fn convert(&self) -> TimeRange {
        TimeRange::new(self.0, self.1)
    }
}

impl Convert<(Timespec, Timespec)> for TimeRange {
    fn convert(&self) -> (Timespec, Timespec) {
        (self.begin, self.end)
    }
}

/// Pair of datetime64[ns] values to a half-open range.
impl TryConvert<TimeRange> for (i64, i64) {
    fn try_convert(&self) -> Result<TimeRange> {
        if self.0 == i64::MIN || self.1 == i64::MIN {
            return Err(Error::InvalidArgument(
                "range bounds must not be NaT".to_string(),
            ));
        }
        Ok(TimeRange::new(self.0.convert(), self.1.convert()))
    }
}

/// Object sequence of exactly two timestamps to a range.
impl TryConvert<TimeRange> for [Object] {
    fn try_convert(&self) -> Result<TimeRange> {
        if self.len() != 2 {
            return Err(Error::InvalidArgument(format!(
                "a time range needs exactly 2 values, got {}",
                self.len()
            )));
        }
        let begin: Timespec = self[0].try_convert()?;
        let end: Timespec = self[1].try_convert()?;
        if begin.is_null() || end.is_null() {
            return Err(Error::InvalidArgument(
                "range bounds must not be None".to_string(),
            ));
        }
        Ok(TimeRange::new(begin, end))
    }
}

fn object_mismatch(value: &Object, target: &str) -> Error {
    Error::IncompatibleType(format!(
        "cannot store object of type '{}' in a {} column",
        value.type_name(),
        target
    ))
}

impl TryConvert<Timespec> for Object {
    fn try_convert(&self) -> Result<Timespec> {
        match self {
            Object::None => Ok(Timespec::NULL),
            Object::Int(nanos) => Ok(nanos.convert()),
            other => Err(object_mismatch(other, "timestamp")),
        }
    }
}

impl TryConvert<String> for Object {
    fn try_convert(&self) -> Result<String> {
        match self {
            Object::None => Ok(String::new()),
            Object::Str(s) => Ok(s.clone()),
            other => Err(object_mismatch(other, "string")),
        }
    }
}

impl TryConvert<Vec<u8>> for Object {
    fn try_convert(&self) -> Result<Vec<u8>> {
        match self {
            Object::None => Ok(Vec::new()),
            Object::Bytes(b) => Ok(b.clone()),
            other => Err(object_mismatch(other, "blob")),
        }
    }
}

/// Store values back to objects. Nulls become `None`.
impl Convert<Object> for Timespec {
    fn convert(&self) -> Object {
        if self.is_null() {
            Object::None
        } else {
            Object::Int(self.convert())
        }
    }
}

impl Convert<Object> for String {
    fn convert(&self) -> Object {
        if self.is_empty() {
            Object::None
        } else {
            Object::Str(self.clone())
        }
    }
}

impl Convert<Object> for Vec<u8> {
    fn convert(&self) -> Object {
        if self.is_empty() {
            Object::None
        } else {
            Object::Bytes(self.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_widening_casts() {
        let a: i64 = 7i16.convert();
        let b: i64 = (-9i32).convert();
        let c: f64 = 0.5f32.convert();
        assert_eq!((a, b, c), (7, -9, 0.5));
    }

    #[test]
    fn test_nat_maps_to_null_timestamp() {
        let ts: Timespec = i64::MIN.convert();
        assert!(ts.is_null());
        let back: i64 = ts.convert();
        assert_eq!(back, i64::MIN);
    }

    #[test]
    fn test_nanos_round_trip() {
        for nanos in [0i64, 1, -1, 1_700_000_000_123_456_789, -86_400_000_000_001] {
            let ts: Timespec = nanos.convert();
            let back: i64 = ts.convert();
            assert_eq!(back, nanos);
        }
    }

    #[test]
    fn test_timespec_saturates() {
        let far: i64 = Timespec::new(i64::MAX, 0).convert();
        assert_eq!(far, i64::MAX);
    }

    #[test]
    fn test_datetime_applies_utc_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let dt = tz.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let ts: Timespec = Some(dt).convert();
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp();
        assert_eq!(ts, Timespec::new(expected, 0));
    }

    #[test]
    fn test_null_datetime_skips_offset_correction() {
        let none: Option<DateTime<FixedOffset>> = None;
        assert!(Convert::<Timespec>::convert(&none).is_null());
        let back: Option<DateTime<Utc>> = Timespec::NULL.convert();
        assert!(back.is_none());
    }

    #[test]
    fn test_naive_uses_local_zone() {
        let naive = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap()
            .naive_utc();
        let ts: Timespec = Some(naive).convert();
        let expected = Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .timestamp();
        assert_eq!(ts.tv_sec, expected);
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = Utc.with_ymd_and_hms(2001, 9, 9, 1, 46, 40).unwrap();
        let ts: Timespec = Some(dt).convert();
        let back: Option<DateTime<Utc>> = ts.convert();
        assert_eq!(back, Some(dt));
    }

    #[test]
    fn test_range_from_tuple() {
        let range: TimeRange = (Timespec::new(1, 0), Timespec::new(2, 0)).convert();
        assert_eq!(range.begin, Timespec::new(1, 0));
        let pair: (Timespec, Timespec) = range.convert();
        assert_eq!(pair.1, Timespec::new(2, 0));

        let err = TryConvert::<TimeRange>::try_convert(&(i64::MIN, 5)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_range_from_objects() {
        let ok: TimeRange = [Object::Int(1_000), Object::Int(2_000)][..]
            .try_convert()
            .unwrap();
        assert_eq!(ok.end, Timespec::new(0, 2_000));

        let short: Result<TimeRange> = [Object::Int(1)][..].try_convert();
        assert!(short.is_err());
        let with_none: Result<TimeRange> = [Object::Int(1), Object::None][..].try_convert();
        assert!(with_none.is_err());
    }

    #[test]
    fn test_object_conversions() {
        let s: String = Object::Str("abc".into()).try_convert().unwrap();
        assert_eq!(s, "abc");
        let null: Vec<u8> = Object::None.try_convert().unwrap();
        assert!(null.is_empty());
        let err: Result<Vec<u8>> = Object::Float(1.0).try_convert();
        assert!(matches!(err, Err(Error::IncompatibleType(_))));
        assert_eq!(Convert::<Object>::convert(&String::new()), Object::None);
    }
}
