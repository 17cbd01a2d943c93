//! Fuzz target for the UTF-8 decoder and UTF-32 codec views.
//!
//! Arbitrary bytes must never panic the decoder, and valid text must
//! survive a UTF-8 to UTF-32 and back round trip.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tsw_convert::convert::unicode::{utf32_to_string, utf8_decode, utf8_to_string, utf8_to_utf32};

fuzz_target!(|data: &[u8]| {
    let _ = utf8_decode(data).count();
    let decoded = utf8_to_string(data);

    if let Ok(text) = std::str::from_utf8(data) {
        assert_eq!(decoded.as_deref(), Some(text));
        if !text.contains('\0') {
            assert_eq!(utf32_to_string(&utf8_to_utf32(text)), text);
        }
    }
});
