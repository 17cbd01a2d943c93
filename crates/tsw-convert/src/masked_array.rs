//! Arrays paired with a validity mask.

use std::borrow::Cow;

use tsw_common::{Error, Result};

use crate::array::Array;
use crate::dtype::{Dtype, DtypeDescriptor};
use crate::mask::{Mask, MaskProbe};

/// An immutable data buffer and a mask of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    data: Array,
    mask: Mask,
}

impl MaskedArray {
    /// Pair an array with a mask. Fails if their lengths differ or a
    /// fixed-width buffer ends in a partial item.
    pub fn new(data: Array, mask: Mask) -> Result<Self> {
        data.check_stride()?;
        if data.len() != mask.len() {
            return Err(Error::LengthMismatch {
                what: "mask".to_string(),
                expected: data.len(),
                actual: mask.len(),
            });
        }
        Ok(MaskedArray { data, mask })
    }

    /// Array with no null rows.
    pub fn from_array(data: Array) -> Self {
        let mask = Mask::all_valid(data.len());
        MaskedArray { data, mask }
    }

    /// Array with every row null.
    pub fn masked_all(data: Array) -> Self {
        let mask = Mask::all_null(data.len());
        MaskedArray { data, mask }
    }

    /// Derive the mask from the null sentinel of `D`.
    pub fn masked_null<D: Dtype>(data: Array) -> Result<Self> {
        data.check_stride()?;
        let stride = data.stride();
        let bits: Vec<bool> = D::expect_units(&data)?
            .chunks(stride)
            .map(D::is_null)
            .collect();
        Ok(MaskedArray {
            data,
            mask: Mask::new(bits),
        })
    }

    pub fn data(&self) -> &Array {
        &self.data
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn probe(&self) -> MaskProbe {
        self.mask.probe()
    }

    pub fn dtype(&self) -> DtypeDescriptor {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.mask.null_count()
    }

    pub fn into_parts(self) -> (Array, Mask) {
        (self.data, self.mask)
    }

    /// Materialize the code units with every masked row replaced by `fill`.
    ///
    /// For variable-width encodings `fill` is repeated across the whole
    /// stride of a masked item. An all-valid mask borrows the data as is.
    pub fn filled<D: Dtype>(&self, fill: D::Unit) -> Result<Cow<'_, [D::Unit]>> {
        self.data.check_stride()?;
        let units = D::expect_units(&self.data)?;
        let stride = self.data.stride();
        Ok(match self.mask.probe() {
            MaskProbe::AllValid => Cow::Borrowed(units),
            MaskProbe::AllNull => Cow::Owned(vec![fill; units.len()]),
            MaskProbe::Mixed => {
                let mut out = Vec::with_capacity(units.len());
                for (item, &masked) in units.chunks(stride).zip(self.mask.bits()) {
                    if masked {
                        out.resize(out.len() + item.len(), fill.clone());
                    } else {
                        out.extend_from_slice(item);
                    }
                }
                Cow::Owned(out)
            }
        })
    }

    /// [`filled`](Self::filled) with the null sentinel of `D`.
    pub fn filled_null<D: Dtype>(&self) -> Result<Cow<'_, [D::Unit]>> {
        self.filled::<D>(D::null_unit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{Float64Dtype, Int64Dtype, UnicodeDtype};

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = MaskedArray::new(Array::Int64(vec![1, 2]), Mask::new(vec![false])).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_new_rejects_partial_trailing_item() {
        let ragged = Array::Unicode {
            data: vec![b'a' as u32, b'b' as u32, b'c' as u32],
            width: 2,
        };
        let err = MaskedArray::new(ragged.clone(), Mask::new(vec![true])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        // Infallible constructors defer the check to `filled`.
        let arr = MaskedArray::from_array(ragged);
        assert!(arr.filled_null::<UnicodeDtype>().is_err());
    }

    #[test]
    fn test_filled_all_valid_is_zero_copy() {
        let arr = MaskedArray::from_array(Array::Int64(vec![1, 2, 3]));
        let filled = arr.filled_null::<Int64Dtype>().unwrap();
        assert!(matches!(filled, Cow::Borrowed(_)));
        match arr.data() {
            Array::Int64(v) => assert_eq!(filled.as_ptr(), v.as_ptr()),
            other => panic!("unexpected array {other:?}"),
        }
    }

    #[test]
    fn test_filled_all_null() {
        let arr = MaskedArray::masked_all(Array::Int64(vec![1, 2]));
        let filled = arr.filled::<Int64Dtype>(-1).unwrap();
        assert_eq!(&*filled, &[-1, -1]);
    }

    #[test]
    fn test_filled_mixed_uses_null_sentinel() {
        let arr = MaskedArray::new(
            Array::Float64(vec![1.0, 2.0, 3.0]),
            Mask::new(vec![false, true, false]),
        )
        .unwrap();
        let filled = arr.filled_null::<Float64Dtype>().unwrap();
        assert_eq!(filled[0], 1.0);
        assert!(filled[1].is_nan());
        assert_eq!(filled[2], 3.0);
    }

    #[test]
    fn test_filled_mixed_replaces_whole_stride() {
        let arr = MaskedArray::new(
            Array::unicode_from_strs(&["ab", "cd"]),
            Mask::new(vec![true, false]),
        )
        .unwrap();
        let filled = arr.filled_null::<UnicodeDtype>().unwrap();
        assert_eq!(&*filled, &[0, 0, b'c' as u32, b'd' as u32]);
    }

    #[test]
    fn test_filled_wrong_dtype() {
        let arr = MaskedArray::from_array(Array::Int32(vec![1]));
        assert!(matches!(
            arr.filled_null::<Int64Dtype>(),
            Err(Error::IncompatibleType(_))
        ));
    }

    #[test]
    fn test_masked_null_from_sentinels() {
        let arr = MaskedArray::masked_null::<Int64Dtype>(Array::Int64(vec![1, i64::MIN, 3])).unwrap();
        assert_eq!(arr.mask().bits(), &[false, true, false]);
        assert_eq!(arr.null_count(), 1);

        let text = MaskedArray::masked_null::<UnicodeDtype>(Array::unicode_from_strs(&["", "x"]))
            .unwrap();
        assert_eq!(text.probe(), MaskProbe::Mixed);
    }
}
