//! Structured logging for the writer.
//!
//! Two output modes share one event schema:
//! - Human console lines on stderr
//! - JSONL on stderr for log shippers
//!
//! Library code never logs through a global. A [`Writer`](crate::Writer)
//! owns a [`PushLog`], buffers the events of each push in it and flushes
//! them when the push returns. The default sink forwards to `tracing`, so
//! whatever subscriber [`init_logging`] installed renders them.
//!
//! ```ignore
//! use tsw_core::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//! ```

pub mod config;
pub mod events;
pub mod handle;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel, LogSettings};
pub use events::{event_names, Level, LogEvent, Stage};
pub use handle::{LogSink, MemorySink, PushLog, TracingSink};
pub use layer::JsonlLayer;

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// A full `RUST_LOG` filter takes precedence over the configured level.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let installed = match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .with_ansi(std::io::stderr().is_terminal());

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

/// Install logging from the environment alone.
pub fn init_default_logging() {
    init_logging(&LogConfig::from_env(None, None));
}
