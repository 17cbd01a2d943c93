//! Per-writer log handle.
//!
//! A [`PushLog`] buffers the events of one push and hands them to a
//! [`LogSink`] when the push ends, whether it succeeded or not. The writer
//! owns its handle, so two writers never share a buffer.

use std::sync::{Arc, Mutex};

use tsw_common::PushId;

use super::events::{Level, LogEvent, Stage};

/// Destination for flushed events.
pub trait LogSink: Send {
    fn emit(&mut self, event: &LogEvent);
}

/// Re-emits events through `tracing` so the installed subscriber renders them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

macro_rules! emit_at {
    ($level:expr, $event:expr, $fields:expr) => {
        tracing::event!(
            target: "tsw_core::push",
            $level,
            event = %$event.event,
            push_id = %$event.push_id,
            stage = %$event.stage,
            table = $event.table.as_deref(),
            fields = $fields.as_deref(),
            "{}",
            $event.message
        )
    };
}

impl LogSink for TracingSink {
    fn emit(&mut self, event: &LogEvent) {
        let fields = (!event.fields.is_empty())
            .then(|| serde_json::to_string(&event.fields).unwrap_or_default());
        match event.level {
            Level::Trace => emit_at!(tracing::Level::TRACE, event, fields),
            Level::Debug => emit_at!(tracing::Level::DEBUG, event, fields),
            Level::Info => emit_at!(tracing::Level::INFO, event, fields),
            Level::Warn => emit_at!(tracing::Level::WARN, event, fields),
            Level::Error => emit_at!(tracing::Level::ERROR, event, fields),
        }
    }
}

/// Collects flushed events in memory. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of emitted events, in order.
    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event).collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&mut self, event: &LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Buffered logger for a writer.
pub struct PushLog {
    push_id: PushId,
    min_level: Level,
    buffer: Vec<LogEvent>,
    sink: Box<dyn LogSink>,
}

impl std::fmt::Debug for PushLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushLog")
            .field("push_id", &self.push_id)
            .field("min_level", &self.min_level)
            .field("pending", &self.buffer.len())
            .finish()
    }
}

impl Default for PushLog {
    fn default() -> Self {
        PushLog::new(TracingSink)
    }
}

impl PushLog {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        PushLog {
            push_id: PushId::new(),
            min_level: Level::Debug,
            buffer: Vec::new(),
            sink: Box::new(sink),
        }
    }

    /// Drop events below `level` at record time.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Start a new push. Anything still buffered is flushed first.
    pub fn begin(&mut self, push_id: PushId) {
        self.flush();
        self.push_id = push_id;
    }

    pub fn push_id(&self) -> &PushId {
        &self.push_id
    }

    pub fn pending(&self) -> &[LogEvent] {
        &self.buffer
    }

    pub fn record(&mut self, event: LogEvent) {
        if event.level >= self.min_level {
            self.buffer.push(event);
        }
    }

    pub fn event(
        &self,
        level: Level,
        name: &str,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent::new(level, name, &self.push_id, stage, message)
    }

    pub fn debug(&self, name: &str, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Debug, name, stage, message)
    }

    pub fn info(&self, name: &str, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Info, name, stage, message)
    }

    pub fn warn(&self, name: &str, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Warn, name, stage, message)
    }

    pub fn error(&self, name: &str, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Error, name, stage, message)
    }

    /// Hand every buffered event to the sink. Returns how many were emitted.
    pub fn flush(&mut self) -> usize {
        let count = self.buffer.len();
        for event in self.buffer.drain(..) {
            self.sink.emit(&event);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::events::event_names;

    #[test]
    fn test_buffer_until_flush() {
        let sink = MemorySink::new();
        let mut log = PushLog::new(sink.clone());
        log.record(log.info(event_names::PUSH_STARTED, Stage::Index, "start"));
        assert_eq!(log.pending().len(), 1);
        assert!(sink.events().is_empty());

        assert_eq!(log.flush(), 1);
        assert!(log.pending().is_empty());
        assert_eq!(sink.event_names(), vec!["push.started"]);
    }

    #[test]
    fn test_min_level_filters() {
        let sink = MemorySink::new();
        let mut log = PushLog::new(sink.clone()).with_min_level(Level::Info);
        log.record(log.debug("noise", Stage::Build, "dropped"));
        log.record(log.warn("kept", Stage::Retry, "kept"));
        log.flush();
        assert_eq!(sink.event_names(), vec!["kept"]);
    }

    #[test]
    fn test_begin_flushes_and_rebinds_id() {
        let sink = MemorySink::new();
        let mut log = PushLog::new(sink.clone());
        log.record(log.info("first", Stage::Index, "a"));
        let next = PushId("push-20240101-000000-00000000".into());
        log.begin(next.clone());
        assert_eq!(sink.events().len(), 1);
        let event = log.info("second", Stage::Index, "b");
        assert_eq!(event.push_id, next.0);
    }

    #[test]
    fn test_tracing_sink_renders_through_layer() {
        use crate::logging::JsonlLayer;
        use std::io::Write;
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct Shared(Arc<Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Shared::default();
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(buffer.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let mut log = PushLog::default();
            log.record(
                log.warn(event_names::RETRY_TRANSIENT, Stage::Retry, "try again")
                    .with_table("trades"),
            );
            log.flush();
        });

        let out = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(line["event"], "retry.transient");
        assert_eq!(line["stage"], "retry");
        assert_eq!(line["table"], "trades");
        assert_eq!(line["level"], "warn");
        assert_eq!(line["message"], "try again");
    }
}
