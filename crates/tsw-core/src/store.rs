//! The remote store as seen by the writer.
//!
//! Only two calls cross this boundary: listing the columns of a table and
//! submitting a set of batches. Sessions, connections and the wire format
//! live behind [`Store`] implementations.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tsw_common::{Error, Result};

use crate::batch::{BatchOptions, BatchSummary, PushBatch};

pub use tsw_convert::ColumnType;

/// Declared column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Symbol table backing a symbol column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symtable: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnInfo {
            name: name.into(),
            column_type,
            symtable: None,
        }
    }

    pub fn symbol(name: impl Into<String>, symtable: impl Into<String>) -> Self {
        ColumnInfo {
            name: name.into(),
            column_type: ColumnType::Symbol,
            symtable: Some(symtable.into()),
        }
    }
}

/// A table handle with its column metadata resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<ColumnInfo>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Table {
            name: name.into(),
            columns,
        }
    }

    /// Fetch the column list from the store.
    pub fn describe<S: Store + ?Sized>(store: &S, name: &str) -> Result<Self> {
        let columns = store.list_columns(name)?;
        Ok(Table::new(name, columns))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Result of a submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Async pipelines are saturated.
    PipeFull,
    TryAgain,
    Failed { code: i32, message: String },
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    /// Whether the status is transient and worth resubmitting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Status::PipeFull | Status::TryAgain)
    }

    /// Map a non-success status to the error surfaced to callers.
    pub fn into_error(self, attempts: u32) -> Error {
        match self {
            Status::Failed { code, message } => Error::TerminalStore { code, message },
            other => Error::TransientStore {
                status: other.to_string(),
                attempts,
            },
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::PipeFull => f.write_str("async pipe full"),
            Status::TryAgain => f.write_str("try again"),
            Status::Failed { code, message } => write!(f, "error {code}: {message}"),
        }
    }
}

/// Backend that accepts batches.
pub trait Store {
    /// Ordered column metadata of `table`.
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Submit all batches as one request.
    fn submit(&mut self, options: &BatchOptions, batches: &[PushBatch<'_>]) -> Status;
}

impl<S: Store + ?Sized> Store for &mut S {
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        (**self).list_columns(table)
    }

    fn submit(&mut self, options: &BatchOptions, batches: &[PushBatch<'_>]) -> Status {
        (**self).submit(options, batches)
    }
}

/// In-memory store that replays scripted statuses.
///
/// Serves the `tsw` binary's dry runs and the test suites. Every submit is
/// recorded; once the script runs out every submit succeeds.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    schemas: HashMap<String, Vec<ColumnInfo>>,
    script: VecDeque<Status>,
    calls: usize,
    options: Vec<BatchOptions>,
    submitted: Vec<Vec<BatchSummary>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnInfo>) -> Self {
        self.add_table(name, columns);
        self
    }

    pub fn add_table(&mut self, name: &str, columns: Vec<ColumnInfo>) {
        self.schemas.insert(name.to_string(), columns);
    }

    /// Statuses returned by the next submit calls, in order.
    pub fn with_script(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.script.extend(statuses);
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.calls
    }

    /// Batch summaries of every submit call, in order.
    pub fn submitted(&self) -> &[Vec<BatchSummary>] {
        &self.submitted
    }

    pub fn last_submitted(&self) -> Option<&[BatchSummary]> {
        self.submitted.last().map(Vec::as_slice)
    }

    pub fn last_options(&self) -> Option<&BatchOptions> {
        self.options.last()
    }
}

impl Store for ScriptedStore {
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.schemas
            .get(table)
            .cloned()
            .ok_or_else(|| Error::TableNotFound {
                table: table.to_string(),
            })
    }

    fn submit(&mut self, options: &BatchOptions, batches: &[PushBatch<'_>]) -> Status {
        self.calls += 1;
        let status = self.script.pop_front().unwrap_or(Status::Success);
        tracing::debug!(
            mode = %options.mode,
            batches = batches.len(),
            call = self.calls,
            status = %status,
            "scripted submit"
        );
        self.options.push(*options);
        self.submitted
            .push(batches.iter().map(PushBatch::summary).collect());
        status
    }
}
