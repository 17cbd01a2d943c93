//! Push options.
//!
//! Options deserialize from JSON, TOML or a keyword map. Every key is
//! optional:
//!
//! | Key                  | Type                       | Default         |
//! |----------------------|----------------------------|-----------------|
//! | `push_mode`          | transactional/fast/async/truncate | transactional |
//! | `write_through`      | bool                       | true            |
//! | `deduplicate`        | bool or list of columns    | false           |
//! | `deduplication_mode` | drop/upsert                | none            |
//! | `range`              | `[begin_ns, end_ns]`       | none            |
//! | `retries`            | int or retry object        | 0               |
//! | `retry_delay`        | milliseconds               | 3000            |
//! | `retry_exponent`     | int                        | 2               |
//! | `retry_jitter`       | float in `[0, 1]`          | 0.1             |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tsw_common::{Error, Result};
use tsw_convert::convert::TryConvert;
use tsw_convert::TimeRange;

use crate::batch::{BatchOptions, DeduplicationMode, DeduplicationOptions, PushMode};
use crate::retry::{RetryOptions, DEFAULT_DELAY, DEFAULT_EXPONENT, DEFAULT_JITTER};

/// `deduplicate` accepts a flag or an explicit column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Deduplicate {
    Flag(bool),
    Columns(Vec<String>),
}

impl Default for Deduplicate {
    fn default() -> Self {
        Deduplicate::Flag(false)
    }
}

/// `retries` accepts a count or a full retry object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Retries {
    Count(u32),
    Options(RetryOptions),
}

impl Default for Retries {
    fn default() -> Self {
        Retries::Count(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushOptions {
    pub push_mode: PushMode,
    pub write_through: bool,
    pub deduplicate: Deduplicate,
    pub deduplication_mode: Option<DeduplicationMode>,
    /// Explicit truncate range in nanoseconds since the epoch.
    pub range: Option<(i64, i64)>,
    pub retries: Retries,
    /// Delay before the first retry, in milliseconds.
    pub retry_delay: Option<u64>,
    pub retry_exponent: Option<u32>,
    pub retry_jitter: Option<f64>,
}

impl Default for PushOptions {
    fn default() -> Self {
        PushOptions {
            push_mode: PushMode::Transactional,
            write_through: true,
            deduplicate: Deduplicate::default(),
            deduplication_mode: None,
            range: None,
            retries: Retries::default(),
            retry_delay: None,
            retry_exponent: None,
            retry_jitter: None,
        }
    }
}

impl PushOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let options: PushOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let options: PushOptions =
            toml::from_str(text).map_err(|e| Error::Config(e.message().to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Build from a keyword map such as `{"retries": 3, "push_mode": "fast"}`.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let options: PushOptions = serde_json::from_value(value)?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_mode(mut self, mode: PushMode) -> Self {
        self.push_mode = mode;
        self
    }

    pub fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    pub fn with_deduplicate_all(mut self, mode: DeduplicationMode) -> Self {
        self.deduplicate = Deduplicate::Flag(true);
        self.deduplication_mode = Some(mode);
        self
    }

    pub fn with_deduplicate_columns<I, S>(mut self, mode: DeduplicationMode, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deduplicate = Deduplicate::Columns(columns.into_iter().map(Into::into).collect());
        self.deduplication_mode = Some(mode);
        self
    }

    pub fn with_range(mut self, begin_ns: i64, end_ns: i64) -> Self {
        self.range = Some((begin_ns, end_ns));
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Retries::Count(retries);
        self
    }

    pub fn with_retry_options(mut self, options: RetryOptions) -> Self {
        self.retries = Retries::Options(options);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            mode: self.push_mode,
            write_through: self.write_through,
        }
    }

    /// Deduplication is on only when both `deduplicate` and
    /// `deduplication_mode` are set.
    pub fn deduplication(&self) -> Result<DeduplicationOptions> {
        let Some(mode) = self.deduplication_mode else {
            return Ok(DeduplicationOptions::disabled());
        };
        match &self.deduplicate {
            Deduplicate::Flag(false) => Ok(DeduplicationOptions::disabled()),
            Deduplicate::Flag(true) => Ok(DeduplicationOptions::all(mode)),
            Deduplicate::Columns(columns) if columns.is_empty() => Err(Error::InvalidArgument(
                "deduplicate column list is empty".to_string(),
            )),
            Deduplicate::Columns(columns) => {
                Ok(DeduplicationOptions::columns(mode, columns.iter().cloned()))
            }
        }
    }

    pub fn retry_options(&self) -> RetryOptions {
        match self.retries {
            Retries::Options(options) => options,
            Retries::Count(0) => RetryOptions::none(),
            Retries::Count(n) => RetryOptions::new(
                n,
                self.retry_delay
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_DELAY),
                self.retry_exponent.unwrap_or(DEFAULT_EXPONENT),
                self.retry_jitter.unwrap_or(DEFAULT_JITTER),
            ),
        }
    }

    pub fn time_range(&self) -> Result<Option<TimeRange>> {
        self.range
            .map(|r| TryConvert::<TimeRange>::try_convert(&r))
            .transpose()
    }

    pub fn validate(&self) -> Result<()> {
        self.retry_options().validate()?;
        self.deduplication()?;
        if let Some(range) = self.time_range()? {
            if range.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "truncate range {range} is empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DedupColumns;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let opts = PushOptions::from_json("{}").unwrap();
        assert_eq!(opts.push_mode, PushMode::Transactional);
        assert!(opts.write_through);
        assert!(!opts.deduplication().unwrap().is_enabled());
        assert!(!opts.retry_options().has_next());
        assert_eq!(opts.time_range().unwrap(), None);
    }

    #[test]
    fn test_retries_count_uses_delay() {
        let opts = PushOptions::from_value(json!({"retries": 3, "retry_delay": 500})).unwrap();
        let retry = opts.retry_options();
        assert_eq!(retry.retries_left, 3);
        assert_eq!(retry.delay, Duration::from_millis(500));
        assert_eq!(retry.exponent, 2);
    }

    #[test]
    fn test_retries_object() {
        let opts = PushOptions::from_value(json!({
            "retries": {"retries_left": 2, "delay_ms": 10, "exponent": 3, "jitter": 0.0}
        }))
        .unwrap();
        assert_eq!(
            opts.retry_options(),
            RetryOptions::new(2, Duration::from_millis(10), 3, 0.0)
        );
    }

    #[test]
    fn test_dedup_list_and_flag() {
        let list = PushOptions::from_value(json!({
            "deduplicate": ["a", "b"],
            "deduplication_mode": "upsert"
        }))
        .unwrap()
        .deduplication()
        .unwrap();
        assert_eq!(list.mode, DeduplicationMode::Upsert);
        assert_eq!(
            list.columns,
            DedupColumns::Columns(vec!["a".into(), "b".into()])
        );

        let all = PushOptions::new()
            .with_deduplicate_all(DeduplicationMode::Drop)
            .deduplication()
            .unwrap();
        assert_eq!(all.columns, DedupColumns::All);
    }

    #[test]
    fn test_dedup_without_mode_is_disabled() {
        let opts = PushOptions::from_value(json!({"deduplicate": true})).unwrap();
        assert!(!opts.deduplication().unwrap().is_enabled());
    }

    #[test]
    fn test_empty_dedup_list_rejected() {
        let res = PushOptions::from_value(json!({
            "deduplicate": [],
            "deduplication_mode": "drop"
        }));
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_range_validation() {
        let ok = PushOptions::new().with_range(0, 10).time_range().unwrap();
        assert!(ok.is_some());
        assert!(PushOptions::new().with_range(10, 10).validate().is_err());
        assert!(PushOptions::new()
            .with_range(i64::MIN, 10)
            .validate()
            .is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(PushOptions::from_json(r#"{"pushmode": "fast"}"#).is_err());
    }

    #[test]
    fn test_from_toml() {
        let opts = PushOptions::from_toml(
            "push_mode = \"async\"\nretries = 2\nretry_jitter = 0.0\nrange = [0, 5]\n",
        )
        .unwrap();
        assert_eq!(opts.push_mode, PushMode::Async);
        assert_eq!(opts.retry_options().jitter, 0.0);
        assert_eq!(opts.range, Some((0, 5)));
        assert!(matches!(
            PushOptions::from_toml("push_mode = 3"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bad_jitter() {
        let res = PushOptions::from_value(json!({"retries": 1, "retry_jitter": 2.0}));
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }
}
