//! JSONL tracing layer.
//!
//! Writes one JSON object per event to stderr, keeping stdout free for
//! command output. `push_id`, `stage` and `table` recorded on enclosing
//! spans are lifted onto every event inside them.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

#[derive(Debug, Clone, Default)]
struct SpanContext {
    push_id: Option<String>,
    stage: Option<String>,
    table: Option<String>,
}

impl SpanContext {
    fn fill_from(&mut self, other: &SpanContext) {
        if self.push_id.is_none() {
            self.push_id.clone_from(&other.push_id);
        }
        if self.stage.is_none() {
            self.stage.clone_from(&other.stage);
        }
        if self.table.is_none() {
            self.table.clone_from(&other.table);
        }
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "push_id" => self.push_id = Some(value),
            "stage" => self.stage = Some(value),
            "table" => self.table = Some(value),
            _ => {}
        }
    }
}

impl Visit for SpanContext {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.set(field.name(), format!("{value:?}"));
    }
}

/// Collects event fields into a JSON map, pulling out `message`.
#[derive(Default)]
struct JsonFieldVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, value.into());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.insert(field, text.into());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }
}

/// Layer that renders events as JSON lines.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer::new(io::stderr())
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut context = SpanContext::default();
        attrs.record(&mut context);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        // Event fields win over span fields of the same name.
        let mut context = SpanContext::default();
        for key in ["push_id", "stage", "table"] {
            if let Some(serde_json::Value::String(s)) = visitor.fields.remove(key) {
                context.set(key, s);
            }
        }
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    context.fill_from(span_ctx);
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();
        obj.insert("ts".into(), ts.to_rfc3339().into());
        obj.insert("level".into(), serde_json::json!(level));
        let name = visitor
            .fields
            .remove("event")
            .unwrap_or_else(|| event.metadata().target().into());
        obj.insert("event".into(), name);
        if let Some(id) = context.push_id {
            obj.insert("push_id".into(), id.into());
        }
        if let Some(stage) = context.stage {
            obj.insert("stage".into(), stage.into());
        }
        if let Some(table) = context.table {
            obj.insert("table".into(), table.into());
        }
        if let Some(message) = visitor.message {
            obj.insert("message".into(), message.into());
        }
        if !visitor.fields.is_empty() {
            obj.insert("fields".into(), serde_json::Value::Object(visitor.fields));
        }

        let line = serde_json::Value::Object(obj).to_string();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<serde_json::Value> {
        let buffer = Shared::default();
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(buffer.clone()));
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_event_line_shape() {
        let lines = capture(|| {
            tracing::info!(target: "push.finished", rows = 3u64, "pushed");
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["event"], "push.finished");
        assert_eq!(lines[0]["message"], "pushed");
        assert_eq!(lines[0]["fields"]["rows"], 3);
    }

    #[test]
    fn test_span_context_is_lifted() {
        let lines = capture(|| {
            let span = tracing::info_span!("push", push_id = "push-1", stage = "submit");
            let _guard = span.enter();
            tracing::warn!(table = "trades", "transient status");
        });
        assert_eq!(lines[0]["push_id"], "push-1");
        assert_eq!(lines[0]["stage"], "submit");
        assert_eq!(lines[0]["table"], "trades");
        assert!(lines[0].get("fields").is_none());
    }

    #[test]
    fn test_event_field_overrides_target() {
        let lines = capture(|| {
            tracing::debug!(event = "retry.sleeping", delay_ms = 3000u64, "Sleeping");
        });
        assert_eq!(lines[0]["event"], "retry.sleeping");
        assert_eq!(lines[0]["fields"]["delay_ms"], 3000);
    }

    #[test]
    fn test_non_finite_float_dropped() {
        let lines = capture(|| {
            tracing::info!(ratio = f64::NAN, "nan");
        });
        assert!(lines[0].get("fields").is_none());
    }
}
