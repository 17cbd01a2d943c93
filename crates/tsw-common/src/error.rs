//! Error types for the time-series writer.
//!
//! Every failure on the write path maps to one [`Error`] variant with:
//! - A stable numeric code for machine parsing
//! - A category for grouping
//! - A recoverability hint (only transient store statuses are recoverable)
//! - A remediation string for humans
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 10,
//!   "category": "conversion",
//!   "message": "unsupported conversion: dtype kind 'u' (1 bytes) into column type 'int64'",
//!   "recoverable": false,
//!   "suggested_action": "fix_input",
//!   "context": { "kind": "u", "itemsize": 1, "column_type": "int64" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for write path operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Source data could not be converted into a column's store type.
    Conversion,
    /// Caller supplied malformed data or options.
    Argument,
    /// The store rejected or deferred a push.
    Store,
    /// Configuration loading and validation errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Conversion => write!(f, "conversion"),
            ErrorCategory::Argument => write!(f, "argument"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for callers to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the push later (possibly with more retries).
    Retry,
    /// Fix the data being pushed.
    FixInput,
    /// Fix the table schema or the data types feeding it.
    FixSchema,
    /// Fix the configuration file or options.
    FixConfig,
    /// Abort the operation.
    Abort,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::FixSchema => write!(f, "fix_schema"),
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::Abort => write!(f, "abort"),
        }
    }
}

/// Unified error type for the write path.
#[derive(Error, Debug)]
pub enum Error {
    // Conversion errors (10-19)
    #[error("unsupported conversion: dtype kind '{kind}' ({itemsize} bytes) into column type '{column_type}'")]
    UnsupportedConversion {
        kind: String,
        itemsize: usize,
        column_type: String,
    },

    #[error("incompatible type: {0}")]
    IncompatibleType(String),

    // Argument errors (20-29)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("table '{table}' has no columns to push")]
    EmptyBatch { table: String },

    #[error("column index {index} out of bounds for table with {count} columns")]
    ColumnOutOfBounds { index: usize, count: usize },

    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("no retries left")]
    RetriesExhausted,

    // Store errors (30-39)
    #[error("store still busy after {attempts} attempts: {status}")]
    TransientStore { status: String, attempts: u32 },

    #[error("store error {code}: {message}")]
    TerminalStore { code: i32, message: String },

    #[error("table not found: {table}")]
    TableNotFound { table: String },

    // Config errors (40-49)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Conversion errors
    /// - 20-29: Argument errors
    /// - 30-39: Store errors
    /// - 40-49: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::UnsupportedConversion { .. } => 10,
            Error::IncompatibleType(_) => 11,
            Error::InvalidArgument(_) => 20,
            Error::EmptyBatch { .. } => 21,
            Error::ColumnOutOfBounds { .. } => 22,
            Error::LengthMismatch { .. } => 23,
            Error::RetriesExhausted => 24,
            Error::TransientStore { .. } => 30,
            Error::TerminalStore { .. } => 31,
            Error::TableNotFound { .. } => 32,
            Error::Config(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedConversion { .. } | Error::IncompatibleType(_) => {
                ErrorCategory::Conversion
            }

            Error::InvalidArgument(_)
            | Error::EmptyBatch { .. }
            | Error::ColumnOutOfBounds { .. }
            | Error::LengthMismatch { .. }
            | Error::RetriesExhausted => ErrorCategory::Argument,

            Error::TransientStore { .. }
            | Error::TerminalStore { .. }
            | Error::TableNotFound { .. } => ErrorCategory::Store,

            Error::Config(_) => ErrorCategory::Config,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether a later attempt with the same input may succeed.
    ///
    /// Conversion and staging errors are schema or programming errors and
    /// never go away on their own.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransientStore { .. })
    }

    /// Returns the suggested action for callers.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::UnsupportedConversion { .. } => SuggestedAction::FixSchema,
            Error::IncompatibleType(_) => SuggestedAction::FixSchema,

            Error::InvalidArgument(_) => SuggestedAction::FixInput,
            Error::EmptyBatch { .. } => SuggestedAction::FixInput,
            Error::ColumnOutOfBounds { .. } => SuggestedAction::FixInput,
            Error::LengthMismatch { .. } => SuggestedAction::FixInput,
            Error::RetriesExhausted => SuggestedAction::Abort,

            Error::TransientStore { .. } => SuggestedAction::Retry,
            Error::TerminalStore { .. } => SuggestedAction::Abort,
            Error::TableNotFound { .. } => SuggestedAction::FixSchema,

            Error::Config(_) => SuggestedAction::FixConfig,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::FixInput,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::UnsupportedConversion { .. } => {
                "Cast the source array to a dtype accepted by the column (int16/32/64, float32/64, datetime64[ns], unicode, bytes or object)."
            }
            Error::IncompatibleType(_) => {
                "The value cannot be stored in the declared column type. Check the table schema."
            }
            Error::InvalidArgument(_) => "Check the arguments passed to the writer.",
            Error::EmptyBatch { .. } => "Provide data for at least one column of the table.",
            Error::ColumnOutOfBounds { .. } => {
                "Provide exactly one array per declared table column."
            }
            Error::LengthMismatch { .. } => {
                "Every data array must be exactly as long as the index array."
            }
            Error::RetriesExhausted => "The retry policy has no attempts left.",
            Error::TransientStore { .. } => {
                "The store is overloaded. Retry later or raise the retry count and delay."
            }
            Error::TerminalStore { .. } => {
                "The store rejected the push. Inspect the store error code and message."
            }
            Error::TableNotFound { .. } => "Create the table before pushing to it.",
            Error::Config(_) => "Run 'tsw check-config <file>' to validate the configuration.",
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq . <file>'.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::UnsupportedConversion { .. } => "Unsupported Conversion",
            Error::IncompatibleType(_) => "Incompatible Type",
            Error::InvalidArgument(_) => "Invalid Argument",
            Error::EmptyBatch { .. } => "Empty Batch",
            Error::ColumnOutOfBounds { .. } => "Column Out Of Bounds",
            Error::LengthMismatch { .. } => "Length Mismatch",
            Error::RetriesExhausted => "Retries Exhausted",
            Error::TransientStore { .. } => "Store Busy",
            Error::TerminalStore { .. } => "Store Error",
            Error::TableNotFound { .. } => "Table Not Found",
            Error::Config(_) => "Configuration Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for callers.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g. table, column type).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::UnsupportedConversion {
                kind,
                itemsize,
                column_type,
            } => {
                context.insert("kind".to_string(), serde_json::json!(kind));
                context.insert("itemsize".to_string(), serde_json::json!(itemsize));
                context.insert("column_type".to_string(), serde_json::json!(column_type));
            }
            Error::EmptyBatch { table } | Error::TableNotFound { table } => {
                context.insert("table".to_string(), serde_json::json!(table));
            }
            Error::ColumnOutOfBounds { index, count } => {
                context.insert("index".to_string(), serde_json::json!(index));
                context.insert("count".to_string(), serde_json::json!(count));
            }
            Error::TransientStore { status, attempts } => {
                context.insert("status".to_string(), serde_json::json!(status));
                context.insert("attempts".to_string(), serde_json::json!(attempts));
            }
            Error::TerminalStore { code, .. } => {
                context.insert("store_code".to_string(), serde_json::json!(code));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
