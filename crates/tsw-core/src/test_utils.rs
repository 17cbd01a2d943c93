//! Test doubles for the retry sleeper and writer input helpers.
//!
//! Enabled for integration tests through the `test-utils` feature. Scripted
//! store statuses come from [`crate::store::ScriptedStore`].

use std::time::Duration;

use tsw_common::Result;
use tsw_convert::{Array, MaskedArray};

use crate::retry::Sleep;
use crate::store::Table;
use crate::writer::WriterData;

/// Sleeper that records requested delays instead of sleeping.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleep {
    sleeps: Vec<Duration>,
}

impl RecordingSleep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }

    pub fn total(&self) -> Duration {
        self.sleeps.iter().sum()
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}

/// Single-table writer input with nanosecond timestamps.
pub fn single_table(
    table: Table,
    index_ns: Vec<i64>,
    columns: Vec<Option<MaskedArray>>,
) -> Result<WriterData> {
    let mut data = WriterData::new();
    data.append(table, Array::Datetime64Ns(index_ns), columns)?;
    Ok(data)
}
