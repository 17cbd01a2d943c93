//! Fuzz target for push option and writer config parsing.
//!
//! Options come from user JSON and TOML; parsing and validation must
//! return errors, never panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tsw_core::{PushOptions, WriterConfig};

#[derive(Debug, Arbitrary)]
struct Input {
    json: String,
    toml: String,
    retries: u32,
    delay_ms: u64,
}

fuzz_target!(|input: Input| {
    if let Ok(options) = PushOptions::from_json(&input.json) {
        let _ = options.deduplication();
        let _ = options.time_range();
        let _ = options.retry_options().next();
    }
    let _ = WriterConfig::from_toml_str(&input.toml);

    let mut retry = PushOptions::new()
        .with_retries(input.retries.min(64))
        .with_retry_delay(std::time::Duration::from_millis(input.delay_ms))
        .retry_options();
    while let Ok(next) = retry.next() {
        retry = next;
    }
});
