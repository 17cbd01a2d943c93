//! Structured push events.
//!
//! Every event carries the push id it belongs to and the pipeline stage
//! that produced it, so a JSONL stream can be grouped per push.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tsw_common::PushId;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of a single push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Staging input arrays into store buffers.
    Index,
    /// Resolving options, truncate ranges and deduplication.
    Resolve,
    /// Building batch descriptors.
    Build,
    /// Handing batches to the store.
    Submit,
    /// Waiting out a transient store status.
    Retry,
    /// Outcome of the push.
    Finish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Index => "index",
            Stage::Resolve => "resolve",
            Stage::Build => "build",
            Stage::Submit => "submit",
            Stage::Retry => "retry",
            Stage::Finish => "finish",
        })
    }
}

/// Stable event names.
pub mod event_names {
    pub const PUSH_STARTED: &str = "push.started";
    pub const PUSH_FINISHED: &str = "push.finished";
    pub const PUSH_FAILED: &str = "push.failed";

    pub const INDEX_TABLE_STAGED: &str = "index.table_staged";

    pub const RESOLVE_TRUNCATE_RANGE: &str = "resolve.truncate_range";
    pub const RESOLVE_DEDUPLICATION: &str = "resolve.deduplication";

    pub const BUILD_BATCH_READY: &str = "build.batch_ready";

    pub const SUBMIT_ATTEMPT: &str = "submit.attempt";

    pub const RETRY_PIPE_FULL: &str = "retry.pipe_full";
    pub const RETRY_TRANSIENT: &str = "retry.transient";
    pub const RETRY_SLEEPING: &str = "retry.sleeping";
    pub const RETRY_RESUMED: &str = "retry.resumed";
}

/// One structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Dotted event name, see [`event_names`].
    pub event: String,
    pub push_id: String,
    pub stage: Stage,
    /// Table the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        push_id: &PushId,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            push_id: push_id.to_string(),
            stage,
            table: None,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attach a field. Values that fail to serialize are dropped.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
