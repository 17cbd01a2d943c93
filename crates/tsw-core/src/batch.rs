//! Batch descriptors handed to the store.
//!
//! A [`PushBatch`] borrows every buffer from the staged table it was built
//! from, so it cannot outlive that table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tsw_convert::{ColumnType, PrimitiveColumn, TimeRange, Timespec};

/// How the store applies a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    /// All tables commit or none do.
    #[default]
    Transactional,
    Fast,
    Async,
    /// Delete the covered time range, then insert.
    Truncate,
}

impl fmt::Display for PushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PushMode::Transactional => "transactional",
            PushMode::Fast => "fast",
            PushMode::Async => "async",
            PushMode::Truncate => "truncate",
        })
    }
}

impl FromStr for PushMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transactional" => Ok(PushMode::Transactional),
            "fast" => Ok(PushMode::Fast),
            "async" => Ok(PushMode::Async),
            "truncate" => Ok(PushMode::Truncate),
            _ => Err(format!("unknown push mode: {s}")),
        }
    }
}

/// What the store does with rows that duplicate existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeduplicationMode {
    /// Keep the existing row.
    Drop,
    /// Replace the existing row.
    Upsert,
}

impl fmt::Display for DeduplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeduplicationMode::Drop => "drop",
            DeduplicationMode::Upsert => "upsert",
        })
    }
}

impl FromStr for DeduplicationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(DeduplicationMode::Drop),
            "upsert" => Ok(DeduplicationMode::Upsert),
            _ => Err(format!("unknown deduplication mode: {s}")),
        }
    }
}

/// Columns compared when looking for duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DedupColumns {
    #[default]
    Disabled,
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeduplicationOptions {
    pub mode: DeduplicationMode,
    pub columns: DedupColumns,
}

impl Default for DeduplicationOptions {
    fn default() -> Self {
        DeduplicationOptions::disabled()
    }
}

impl DeduplicationOptions {
    pub fn disabled() -> Self {
        DeduplicationOptions {
            mode: DeduplicationMode::Drop,
            columns: DedupColumns::Disabled,
        }
    }

    pub fn all(mode: DeduplicationMode) -> Self {
        DeduplicationOptions {
            mode,
            columns: DedupColumns::All,
        }
    }

    pub fn columns<I, S>(mode: DeduplicationMode, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DeduplicationOptions {
            mode,
            columns: DedupColumns::Columns(columns.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.columns, DedupColumns::Disabled)
    }
}

/// Per-request flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub mode: PushMode,
    pub write_through: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            mode: PushMode::Transactional,
            write_through: true,
        }
    }
}

/// Borrowed view of a staged buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnData<'a> {
    Int64(&'a [i64]),
    Double(&'a [f64]),
    Timestamp(&'a [Timespec]),
    Blob(&'a [Vec<u8>]),
    String(&'a [String]),
}

impl<'a> From<&'a PrimitiveColumn> for ColumnData<'a> {
    fn from(column: &'a PrimitiveColumn) -> Self {
        match column {
            PrimitiveColumn::Int64(v) => ColumnData::Int64(v),
            PrimitiveColumn::Double(v) => ColumnData::Double(v),
            PrimitiveColumn::Timestamp(v) => ColumnData::Timestamp(v),
            PrimitiveColumn::Blob(v) => ColumnData::Blob(v),
            PrimitiveColumn::String(v) => ColumnData::String(v),
        }
    }
}

impl ColumnData<'_> {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
            ColumnData::Blob(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the first element, for checking that nothing was copied.
    pub fn as_ptr(&self) -> *const u8 {
        match self {
            ColumnData::Int64(v) => v.as_ptr().cast(),
            ColumnData::Double(v) => v.as_ptr().cast(),
            ColumnData::Timestamp(v) => v.as_ptr().cast(),
            ColumnData::Blob(v) => v.as_ptr().cast(),
            ColumnData::String(v) => v.as_ptr().cast(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchColumn<'a> {
    pub name: &'a str,
    /// Wire type; symbol columns are sent as strings.
    pub data_type: ColumnType,
    pub data: ColumnData<'a>,
}

/// One table's worth of a push request.
#[derive(Debug, Clone, PartialEq)]
pub struct PushBatch<'a> {
    pub name: &'a str,
    pub timestamps: &'a [Timespec],
    pub columns: Vec<BatchColumn<'a>>,
    pub truncate_ranges: Vec<TimeRange>,
    /// Whole-batch or per-column deduplication, if any.
    pub deduplication_mode: Option<DeduplicationMode>,
    /// Columns compared for duplicates. `None` with a mode set means all.
    pub where_duplicate: Option<Vec<&'a str>>,
}

impl PushBatch<'_> {
    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            table: self.name.to_string(),
            rows: self.row_count(),
            columns: self
                .columns
                .iter()
                .map(|c| ColumnSummary {
                    name: c.name.to_string(),
                    data_type: c.data_type,
                    len: c.data.len(),
                })
                .collect(),
            truncate_ranges: self.truncate_ranges.clone(),
            deduplication_mode: self.deduplication_mode,
            where_duplicate: self
                .where_duplicate
                .as_ref()
                .map(|cols| cols.iter().map(|c| c.to_string()).collect()),
        }
    }
}

/// Owned, serializable description of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub table: String,
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truncate_ranges: Vec<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplication_mode: Option<DeduplicationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_duplicate: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: ColumnType,
    pub len: usize,
}
