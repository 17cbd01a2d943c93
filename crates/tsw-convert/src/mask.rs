//! Validity masks.
//!
//! A mask holds one flag per row, `true` meaning the row is null. Most
//! real masks are entirely clear or entirely set, so [`probe`] classifies
//! a mask in fixed-size chunks and stops as soon as it has seen both
//! states.

/// Classification of a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskProbe {
    /// No row is null.
    AllValid,
    /// Every row is null.
    AllNull,
    Mixed,
}

/// Rows classified per chunk. Large enough to amortize the per-chunk check,
/// small enough that a mixed mask is detected early.
pub const CHUNK_SIZE: usize = 256;

const UNKNOWN: u8 = 0;
const ALL_TRUE: u8 = 1;
const ALL_FALSE: u8 = 2;
const MIXED: u8 = ALL_TRUE | ALL_FALSE;

#[inline]
fn probe_chunk(chunk: &[bool]) -> u8 {
    // true sets bit 0, false sets bit 1
    chunk
        .iter()
        .fold(UNKNOWN, |state, &masked| state | (1 << u8::from(!masked)))
}

/// Classify a mask. An empty mask is all valid.
pub fn probe(mask: &[bool]) -> MaskProbe {
    let mut state = UNKNOWN;
    for chunk in mask.chunks(CHUNK_SIZE) {
        state |= probe_chunk(chunk);
        if state == MIXED {
            break;
        }
    }
    match state {
        ALL_TRUE => MaskProbe::AllNull,
        MIXED => MaskProbe::Mixed,
        _ => MaskProbe::AllValid,
    }
}

/// A validity mask with its probe result computed up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    bits: Vec<bool>,
    probe: MaskProbe,
}

impl Mask {
    pub fn new(bits: Vec<bool>) -> Self {
        let probe = probe(&bits);
        Mask { bits, probe }
    }

    pub fn all_valid(len: usize) -> Self {
        Mask {
            bits: vec![false; len],
            probe: MaskProbe::AllValid,
        }
    }

    pub fn all_null(len: usize) -> Self {
        let probe = if len == 0 {
            MaskProbe::AllValid
        } else {
            MaskProbe::AllNull
        };
        Mask {
            bits: vec![true; len],
            probe,
        }
    }

    pub fn probe(&self) -> MaskProbe {
        self.probe
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.bits.get(row).copied().unwrap_or(false)
    }

    pub fn null_count(&self) -> usize {
        match self.probe {
            MaskProbe::AllValid => 0,
            MaskProbe::AllNull => self.bits.len(),
            MaskProbe::Mixed => self.bits.iter().filter(|b| **b).count(),
        }
    }
}

impl From<Vec<bool>> for Mask {
    fn from(bits: Vec<bool>) -> Self {
        Mask::new(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_basic_states() {
        assert_eq!(probe(&[]), MaskProbe::AllValid);
        assert_eq!(probe(&[false, false]), MaskProbe::AllValid);
        assert_eq!(probe(&[true, true]), MaskProbe::AllNull);
        assert_eq!(probe(&[false, true]), MaskProbe::Mixed);
    }

    #[test]
    fn test_probe_across_chunk_boundary() {
        let mut bits = vec![true; CHUNK_SIZE * 3];
        assert_eq!(probe(&bits), MaskProbe::AllNull);
        bits[CHUNK_SIZE * 2 + 7] = false;
        assert_eq!(probe(&bits), MaskProbe::Mixed);
    }

    #[test]
    fn test_probe_partial_last_chunk() {
        let mut bits = vec![false; CHUNK_SIZE + 1];
        assert_eq!(probe(&bits), MaskProbe::AllValid);
        bits[CHUNK_SIZE] = true;
        assert_eq!(probe(&bits), MaskProbe::Mixed);
    }

    #[test]
    fn test_mask_constructors() {
        assert_eq!(Mask::all_null(0).probe(), MaskProbe::AllValid);
        assert_eq!(Mask::all_null(3).null_count(), 3);
        assert_eq!(Mask::all_valid(3).null_count(), 0);
        let mask = Mask::from(vec![false, true, false]);
        assert_eq!(mask.probe(), MaskProbe::Mixed);
        assert_eq!(mask.null_count(), 1);
        assert!(mask.is_null(1));
        assert!(!mask.is_null(10));
    }
}
