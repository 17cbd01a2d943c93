//! Push orchestration.
//!
//! A push runs in five steps:
//! 1. Index the caller's arrays into staged tables
//! 2. Resolve deduplication and, in truncate mode, the truncate range
//! 3. Build one batch per table
//! 4. Submit all batches in a single store call
//! 5. Resubmit the same batches while the store reports a transient status
//!    and retries are left
//!
//! Conversion and staging errors abort the push before the store is
//! contacted. Staged buffers are released when the push returns.

use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};
use tsw_common::{Error, PushId, Result};
use tsw_convert::{Array, MaskedArray, TimeRange};

use crate::batch::{BatchOptions, PushBatch, PushMode};
use crate::logging::{event_names, PushLog, Stage};
use crate::metrics::{PushMetrics, BATCH_PUSH};
use crate::options::PushOptions;
use crate::retry::{RetryOptions, Sleep, ThreadSleep};
use crate::staged::StagedTables;
use crate::store::{Status, Store, Table};

/// One table's input: the index and one optional array per declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterTableData {
    table: Table,
    index: Array,
    columns: Vec<Option<MaskedArray>>,
}

impl WriterTableData {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn index(&self) -> &Array {
        &self.index
    }

    /// `None` entries are pushed as all-null columns.
    pub fn columns(&self) -> &[Option<MaskedArray>] {
        &self.columns
    }
}

/// Input of a push: any number of distinct tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterData {
    tables: Vec<WriterTableData>,
}

impl WriterData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. `columns` must line up with the table's declared columns
    /// and every present column must have one value per index row.
    pub fn append(
        &mut self,
        table: Table,
        index: Array,
        columns: Vec<Option<MaskedArray>>,
    ) -> Result<()> {
        if columns.len() != table.columns().len() {
            return Err(Error::LengthMismatch {
                what: format!("columns of table '{}'", table.name()),
                expected: table.columns().len(),
                actual: columns.len(),
            });
        }
        for (info, column) in table.columns().iter().zip(&columns) {
            if let Some(column) = column {
                if column.len() != index.len() {
                    return Err(Error::LengthMismatch {
                        what: format!("column '{}' of table '{}'", info.name, table.name()),
                        expected: index.len(),
                        actual: column.len(),
                    });
                }
            }
        }
        if self.tables.iter().any(|t| t.table.name() == table.name()) {
            return Err(Error::InvalidArgument(format!(
                "table '{}' was already added to this push",
                table.name()
            )));
        }
        self.tables.push(WriterTableData {
            table,
            index,
            columns,
        });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriterTableData> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Summary of a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub push_id: PushId,
    /// Submit calls made, including the successful one.
    pub attempts: u32,
    pub tables: usize,
    pub rows: usize,
    /// Time spent in store submit calls, summed over attempts.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64() * 1000.0)
}

/// Stages data and pushes it to a [`Store`].
pub struct Writer<S, Z = ThreadSleep> {
    store: S,
    sleeper: Z,
    log: PushLog,
    metrics: Option<PushMetrics>,
}

impl<S: Store> Writer<S> {
    pub fn new(store: S) -> Self {
        Writer {
            store,
            sleeper: ThreadSleep,
            log: PushLog::default(),
            metrics: None,
        }
    }
}

impl<S: Store, Z: Sleep> Writer<S, Z> {
    /// Swap the sleeper used between retries.
    pub fn with_sleeper<Y: Sleep>(self, sleeper: Y) -> Writer<S, Y> {
        Writer {
            store: self.store,
            sleeper,
            log: self.log,
            metrics: self.metrics,
        }
    }

    pub fn with_log(mut self, log: PushLog) -> Self {
        self.log = log;
        self
    }

    /// Record the duration of every submit call under [`BATCH_PUSH`].
    pub fn with_metrics(mut self, metrics: PushMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    pub fn log(&self) -> &PushLog {
        &self.log
    }

    pub fn metrics(&self) -> Option<&PushMetrics> {
        self.metrics.as_ref()
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Resolve a table's columns through the store.
    pub fn table(&self, name: &str) -> Result<Table> {
        Table::describe(&self.store, name)
    }

    /// Push in the mode named by `options.push_mode`.
    pub fn push(&mut self, data: &WriterData, options: &PushOptions) -> Result<PushOutcome> {
        self.push_with(options.push_mode, data, options)
    }

    pub fn push_fast(&mut self, data: &WriterData, options: &PushOptions) -> Result<PushOutcome> {
        self.push_with(PushMode::Fast, data, options)
    }

    pub fn push_async(&mut self, data: &WriterData, options: &PushOptions) -> Result<PushOutcome> {
        self.push_with(PushMode::Async, data, options)
    }

    /// Replace the covered time range with `data`.
    ///
    /// Without an explicit `range` the range is derived from the index,
    /// which requires a single table.
    pub fn push_truncate(
        &mut self,
        data: &WriterData,
        options: &PushOptions,
    ) -> Result<PushOutcome> {
        self.push_with(PushMode::Truncate, data, options)
    }

    pub fn push_with(
        &mut self,
        mode: PushMode,
        data: &WriterData,
        options: &PushOptions,
    ) -> Result<PushOutcome> {
        let push_id = PushId::new();
        self.log.begin(push_id.clone());
        let span = tracing::debug_span!("push", push_id = %push_id, mode = %mode);
        let _guard = span.enter();

        let event = self
            .log
            .debug(event_names::PUSH_STARTED, Stage::Index, format!("Starting {mode} push"))
            .with_field("tables", data.len());
        self.log.record(event);

        let mut staged = StagedTables::new();
        let result = self.run(mode, data, options, &mut staged);
        staged.clear();

        let event = match &result {
            Ok(outcome) => self
                .log
                .info(
                    event_names::PUSH_FINISHED,
                    Stage::Finish,
                    format!(
                        "Pushed {} rows to {} tables in {} attempts",
                        outcome.rows, outcome.tables, outcome.attempts
                    ),
                )
                .with_field("rows", outcome.rows)
                .with_field("attempts", outcome.attempts)
                .with_field(
                    "elapsed_us",
                    u64::try_from(outcome.elapsed.as_micros()).unwrap_or(u64::MAX),
                ),
            Err(err) => self
                .log
                .error(event_names::PUSH_FAILED, Stage::Finish, err.to_string())
                .with_field("code", err.code()),
        };
        self.log.record(event);
        self.log.flush();
        result
    }

    fn run(
        &mut self,
        mode: PushMode,
        data: &WriterData,
        options: &PushOptions,
        staged: &mut StagedTables,
    ) -> Result<PushOutcome> {
        options.validate()?;
        let deduplication = options.deduplication()?;

        if mode == PushMode::Truncate {
            if deduplication.is_enabled() {
                return Err(Error::InvalidArgument(
                    "Cannot set `deduplicate` for push_truncate.".to_string(),
                ));
            }
            if data.is_empty() {
                return Err(Error::InvalidArgument(
                    "Writer is empty: you did not provide any rows to push.".to_string(),
                ));
            }
        }

        staged.index(data)?;
        for table in staged.iter() {
            let event = self
                .log
                .debug(
                    event_names::INDEX_TABLE_STAGED,
                    Stage::Index,
                    format!("Staged {} rows", table.row_count()),
                )
                .with_table(table.name())
                .with_field("columns", table.column_count());
            self.log.record(event);
        }
        if staged.is_empty() {
            return Err(Error::InvalidArgument(
                "No data written to batch writer.".to_string(),
            ));
        }

        let truncate_ranges = match mode {
            PushMode::Truncate => vec![self.truncate_range(options, staged)?],
            _ => Vec::new(),
        };
        if deduplication.is_enabled() {
            let event = self
                .log
                .debug(
                    event_names::RESOLVE_DEDUPLICATION,
                    Stage::Resolve,
                    format!("Deduplication mode {}", deduplication.mode),
                )
                .with_field("columns", format!("{:?}", deduplication.columns));
            self.log.record(event);
        }

        let batches = staged
            .iter()
            .map(|table| table.prepare_batch(mode, &deduplication, &truncate_ranges))
            .collect::<Result<Vec<_>>>()?;
        for batch in &batches {
            let event = self
                .log
                .debug(
                    event_names::BUILD_BATCH_READY,
                    Stage::Build,
                    format!(
                        "Pushing {} rows with {} columns in {}",
                        batch.row_count(),
                        batch.column_count(),
                        batch.name
                    ),
                )
                .with_table(batch.name);
            self.log.record(event);
        }

        let batch_options = BatchOptions {
            mode,
            write_through: options.write_through,
        };
        let (attempts, elapsed) =
            self.submit(&batch_options, &batches, options.retry_options())?;

        Ok(PushOutcome {
            push_id: self.log.push_id().clone(),
            attempts,
            tables: batches.len(),
            rows: batches.iter().map(PushBatch::row_count).sum(),
            elapsed,
        })
    }

    fn truncate_range(&mut self, options: &PushOptions, staged: &StagedTables) -> Result<TimeRange> {
        let range = match options.time_range()? {
            Some(range) => range,
            None => {
                if staged.len() > 1 {
                    return Err(Error::InvalidArgument(
                        "Cannot derive a truncate range for multiple tables: provide `range`."
                            .to_string(),
                    ));
                }
                staged.first().and_then(|t| t.time_range()).ok_or_else(|| {
                    Error::InvalidArgument(
                        "Writer is empty: you did not provide any rows to push.".to_string(),
                    )
                })?
            }
        };
        let event = self
            .log
            .debug(
                event_names::RESOLVE_TRUNCATE_RANGE,
                Stage::Resolve,
                format!("Truncating {range}"),
            );
        self.log.record(event);
        Ok(range)
    }

    /// Submit until success, a terminal status or no retries left.
    /// Returns the number of submit calls and the time spent in them.
    fn submit(
        &mut self,
        options: &BatchOptions,
        batches: &[PushBatch<'_>],
        mut retry: RetryOptions,
    ) -> Result<(u32, Duration)> {
        let mut attempts = 0u32;
        let mut elapsed = Duration::ZERO;
        loop {
            attempts += 1;
            let event = self
                .log
                .debug(
                    event_names::SUBMIT_ATTEMPT,
                    Stage::Submit,
                    format!("Submitting {} batches", batches.len()),
                )
                .with_field("attempt", attempts);
            self.log.record(event);

            let started = Instant::now();
            let status = self.store.submit(options, batches);
            let took = started.elapsed();
            elapsed += took;
            if let Some(metrics) = &self.metrics {
                metrics.record(BATCH_PUSH, took);
            }
            if status.is_success() {
                return Ok((attempts, elapsed));
            }
            if !retry.should_retry(&status) {
                return Err(status.into_error(attempts));
            }

            let event = match &status {
                Status::PipeFull => self.log.info(
                    event_names::RETRY_PIPE_FULL,
                    Stage::Retry,
                    "Async pipelines are currently full",
                ),
                other => self.log.warn(
                    event_names::RETRY_TRANSIENT,
                    Stage::Retry,
                    format!("Transient store status: {other}"),
                ),
            };
            self.log.record(event.with_field("retries_left", retry.retries_left));

            let delay_ms = retry.delay.as_millis();
            let event = self
                .log
                .info(
                    event_names::RETRY_SLEEPING,
                    Stage::Retry,
                    format!("Sleeping for {delay_ms} milliseconds"),
                )
                .with_field("delay_ms", u64::try_from(delay_ms).unwrap_or(u64::MAX));
            self.log.record(event);
            self.sleeper.sleep(retry.delay);

            retry = retry.next()?;
            let event = self
                .log
                .warn(
                    event_names::RETRY_RESUMED,
                    Stage::Retry,
                    "Retrying push operation",
                )
                .with_field("retries_left", retry.retries_left);
            self.log.record(event);
        }
    }
}
