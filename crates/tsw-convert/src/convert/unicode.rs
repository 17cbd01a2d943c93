//! Lazy UTF-8 / UTF-32 codec views.
//!
//! Four single-pass iterators, composable in either direction:
//!
//! ```text
//! &[u8] --Utf8Decode--> CodePoint --Utf32Encode--> u32
//! u32   --Utf32Decode-> CodePoint --Utf8Encode---> u8
//! ```
//!
//! None of them allocate. `Utf8Encode` buffers the 1-4 bytes of the
//! current code point in a fixed [`NextChars`] buffer and only pulls from
//! its source once that buffer is drained.

/// A Unicode scalar value, or [`CodePoint::INVALID`] for malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodePoint(pub u32);

impl CodePoint {
    /// Emitted by the decoders for malformed input.
    pub const INVALID: CodePoint = CodePoint(u32::MAX);
    /// Written by the encoders in place of anything that is not a scalar value.
    pub const REPLACEMENT: CodePoint = CodePoint(0xFFFD);

    pub fn is_valid(&self) -> bool {
        self.0 <= 0x10FFFF && !(0xD800..=0xDFFF).contains(&self.0)
    }

    fn or_replacement(self) -> CodePoint {
        if self.is_valid() {
            self
        } else {
            CodePoint::REPLACEMENT
        }
    }
}

/// Decodes UTF-8 bytes into code points.
///
/// A malformed sequence yields [`CodePoint::INVALID`] and resumes one byte
/// after the offending lead byte.
#[derive(Debug, Clone)]
pub struct Utf8Decode<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Utf8Decode<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Utf8Decode { bytes, pos: 0 }
    }

    fn continuation(&self, offset: usize) -> Option<u32> {
        let b = *self.bytes.get(self.pos + offset)?;
        if b & 0xC0 == 0x80 {
            Some(u32::from(b & 0x3F))
        } else {
            None
        }
    }

    fn decode_sequence(&self, lead: u8) -> Option<(u32, usize)> {
        if lead & 0xE0 == 0xC0 {
            let cp = (u32::from(lead & 0x1F) << 6) | self.continuation(1)?;
            (cp >= 0x80).then_some((cp, 2))
        } else if lead & 0xF0 == 0xE0 {
            let cp = (u32::from(lead & 0x0F) << 12)
                | (self.continuation(1)? << 6)
                | self.continuation(2)?;
            (cp >= 0x800 && !(0xD800..=0xDFFF).contains(&cp)).then_some((cp, 3))
        } else if lead & 0xF8 == 0xF0 && lead <= 0xF4 {
            let cp = (u32::from(lead & 0x07) << 18)
                | (self.continuation(1)? << 12)
                | (self.continuation(2)? << 6)
                | self.continuation(3)?;
            (0x10000..=0x10FFFF).contains(&cp).then_some((cp, 4))
        } else {
            None
        }
    }
}

impl Iterator for Utf8Decode<'_> {
    type Item = CodePoint;

    fn next(&mut self) -> Option<CodePoint> {
        let lead = *self.bytes.get(self.pos)?;
        if lead < 0x80 {
            self.pos += 1;
            return Some(CodePoint(u32::from(lead)));
        }
        match self.decode_sequence(lead) {
            Some((cp, len)) => {
                self.pos += len;
                Some(CodePoint(cp))
            }
            None => {
                self.pos += 1;
                Some(CodePoint::INVALID)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bytes.len() - self.pos;
        (remaining.div_ceil(4), Some(remaining))
    }
}

/// Encodes code points as UTF-32 code units.
#[derive(Debug, Clone)]
pub struct Utf32Encode<I> {
    iter: I,
}

impl<I: Iterator<Item = CodePoint>> Iterator for Utf32Encode<I> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.iter.next().map(|cp| cp.or_replacement().0)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// Decodes UTF-32 code units into code points.
#[derive(Debug, Clone)]
pub struct Utf32Decode<I> {
    iter: I,
}

impl<I: Iterator<Item = u32>> Iterator for Utf32Decode<I> {
    type Item = CodePoint;

    fn next(&mut self) -> Option<CodePoint> {
        self.iter.next().map(|unit| {
            let cp = CodePoint(unit);
            if cp.is_valid() {
                cp
            } else {
                CodePoint::INVALID
            }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// Up to four pending UTF-8 bytes of one code point.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextChars {
    units: [u8; 4],
    len: u8,
    pos: u8,
}

impl NextChars {
    fn encode(cp: CodePoint) -> Self {
        let c = cp.or_replacement().0;
        let mut next = NextChars::default();
        if c < 1 << 7 {
            next.units[0] = c as u8;
            next.len = 1;
        } else if c < 1 << 11 {
            next.units[0] = 0xC0 | (c >> 6) as u8;
            next.units[1] = 0x80 | (c & 0x3F) as u8;
            next.len = 2;
        } else if c < 1 << 16 {
            next.units[0] = 0xE0 | (c >> 12) as u8;
            next.units[1] = 0x80 | ((c >> 6) & 0x3F) as u8;
            next.units[2] = 0x80 | (c & 0x3F) as u8;
            next.len = 3;
        } else {
            next.units[0] = 0xF0 | (c >> 18) as u8;
            next.units[1] = 0x80 | ((c >> 12) & 0x3F) as u8;
            next.units[2] = 0x80 | ((c >> 6) & 0x3F) as u8;
            next.units[3] = 0x80 | (c & 0x3F) as u8;
            next.len = 4;
        }
        next
    }

    fn pop(&mut self) -> Option<u8> {
        if self.pos < self.len {
            let b = self.units[usize::from(self.pos)];
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }

    fn remaining(&self) -> usize {
        usize::from(self.len - self.pos)
    }
}

/// Encodes code points as UTF-8 bytes.
#[derive(Debug, Clone)]
pub struct Utf8Encode<I> {
    iter: I,
    next: NextChars,
}

impl<I: Iterator<Item = CodePoint>> Iterator for Utf8Encode<I> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if let Some(b) = self.next.pop() {
            return Some(b);
        }
        self.next = NextChars::encode(self.iter.next()?);
        self.next.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.iter.size_hint();
        let pending = self.next.remaining();
        (
            lo.saturating_add(pending),
            hi.and_then(|h| h.checked_mul(4)?.checked_add(pending)),
        )
    }
}

/// Adapters for code point streams.
pub trait CodePoints: Iterator<Item = CodePoint> + Sized {
    fn utf32_encode(self) -> Utf32Encode<Self> {
        Utf32Encode { iter: self }
    }

    fn utf8_encode(self) -> Utf8Encode<Self> {
        Utf8Encode {
            iter: self,
            next: NextChars::default(),
        }
    }
}

impl<I: Iterator<Item = CodePoint>> CodePoints for I {}

/// Adapter for UTF-32 code unit streams.
pub trait Utf32Units: Iterator<Item = u32> + Sized {
    fn utf32_decode(self) -> Utf32Decode<Self> {
        Utf32Decode { iter: self }
    }
}

impl<I: Iterator<Item = u32>> Utf32Units for I {}

pub fn utf8_decode(bytes: &[u8]) -> Utf8Decode<'_> {
    Utf8Decode::new(bytes)
}

/// UTF-8 text to UTF-32 code units.
pub fn utf8_to_utf32(s: &str) -> Vec<u32> {
    utf8_decode(s.as_bytes()).utf32_encode().collect()
}

/// One UTF-32 stride to a string, stopping at the first zero code unit.
pub fn utf32_to_string(units: &[u32]) -> String {
    let bytes: Vec<u8> = units
        .iter()
        .copied()
        .take_while(|u| *u != 0)
        .utf32_decode()
        .utf8_encode()
        .collect();
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Bytes to a string, failing on the first malformed sequence.
pub fn utf8_to_string(bytes: &[u8]) -> Option<String> {
    utf8_decode(bytes)
        .map(|cp| {
            if cp == CodePoint::INVALID {
                None
            } else {
                char::from_u32(cp.0)
            }
        })
        .collect()
}

/// Trim a variable-width item at its first zero code unit.
pub fn clean_stride<T: PartialEq + Default>(item: &[T]) -> &[T] {
    let zero = T::default();
    match item.iter().position(|u| *u == zero) {
        Some(end) => &item[..end],
        None => item,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<u32> {
        utf8_decode(bytes).map(|cp| cp.0).collect()
    }

    #[test]
    fn test_decode_each_width() {
        let s = "a\u{e9}\u{20ac}\u{1f600}";
        assert_eq!(decode(s.as_bytes()), vec![0x61, 0xE9, 0x20AC, 0x1F600]);
    }

    #[test]
    fn test_encode_each_width() {
        let cps = [0x61u32, 0xE9, 0x20AC, 0x1F600].map(CodePoint);
        let bytes: Vec<u8> = cps.into_iter().utf8_encode().collect();
        assert_eq!(bytes, "a\u{e9}\u{20ac}\u{1f600}".as_bytes());
    }

    #[test]
    fn test_malformed_lead_advances_one_byte() {
        assert_eq!(decode(&[0xFF, b'a']), vec![u32::MAX, 0x61]);
        // Truncated two-byte sequence followed by ASCII.
        assert_eq!(decode(&[0xC3, b'b']), vec![u32::MAX, 0x62]);
        // Lone continuation byte.
        assert_eq!(decode(&[0x80]), vec![u32::MAX]);
        // Lead byte above the Unicode range.
        assert_eq!(decode(&[0xF5, 0x80, 0x80, 0x80]).len(), 4);
    }

    #[test]
    fn test_overlong_and_surrogates_are_invalid() {
        assert_eq!(decode(&[0xC0, 0x80]), vec![u32::MAX, u32::MAX]);
        assert_eq!(decode(&[0xED, 0xA0, 0x80])[0], u32::MAX);
    }

    #[test]
    fn test_out_of_range_encodes_as_replacement() {
        let bytes: Vec<u8> = [CodePoint(0x110000), CodePoint::INVALID]
            .into_iter()
            .utf8_encode()
            .collect();
        assert_eq!(bytes, "\u{fffd}\u{fffd}".as_bytes());
        let units: Vec<u32> = [CodePoint(0xD800)].into_iter().utf32_encode().collect();
        assert_eq!(units, vec![0xFFFD]);
    }

    #[test]
    fn test_utf32_helpers() {
        let units = utf8_to_utf32("h\u{e9}llo");
        assert_eq!(units.len(), 5);
        let mut padded = units.clone();
        padded.extend([0, 0, 0]);
        assert_eq!(utf32_to_string(&padded), "h\u{e9}llo");
        assert_eq!(utf32_to_string(&[0, 0x61]), "");
    }

    #[test]
    fn test_views_are_restartable_from_source() {
        let source = "abc".as_bytes();
        let first: Vec<CodePoint> = utf8_decode(source).collect();
        let second: Vec<CodePoint> = utf8_decode(source).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_size_hint_bounds() {
        let view = utf8_decode("a\u{1f600}".as_bytes());
        assert_eq!(view.size_hint(), (2, Some(5)));
    }

    #[test]
    fn test_utf8_to_string_rejects_malformed() {
        assert_eq!(utf8_to_string(b"ok").as_deref(), Some("ok"));
        assert_eq!(utf8_to_string(&[b'a', 0xFF]), None);
    }

    #[test]
    fn test_clean_stride() {
        assert_eq!(clean_stride(&[1u8, 2, 0, 3]), &[1, 2]);
        assert_eq!(clean_stride(&[1u32, 2]), &[1, 2]);
        assert!(clean_stride::<u32>(&[0, 0]).is_empty());
    }
}
