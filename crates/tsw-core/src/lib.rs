//! Time-series writer core.
//!
//! Stages columnar arrays into typed store buffers and pushes them as
//! multi-column batches:
//! - Staged tables and zero-copy batch building
//! - Push options, deduplication and truncate ranges
//! - Retry policy for transient store statuses
//! - Structured logging of every push
//! - Prometheus timing of every store submit
//!
//! The `tsw` binary entry point is in `main.rs`.

pub mod batch;
pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod metrics;
pub mod options;
pub mod payload;
pub mod retry;
pub mod staged;
pub mod store;
pub mod writer;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use batch::{
    BatchOptions, ColumnData, DedupColumns, DeduplicationMode, DeduplicationOptions, PushBatch,
    PushMode,
};
pub use config::WriterConfig;
pub use metrics::{MetricTotal, PushMetrics};
pub use options::PushOptions;
pub use retry::{RetryOptions, Sleep, ThreadSleep};
pub use staged::{StagedTable, StagedTables};
pub use store::{ColumnInfo, ScriptedStore, Status, Store, Table};
pub use writer::{PushOutcome, Writer, WriterData};

pub use tsw_common::{Error, PushId, Result};
