//! JSON line logging through a background writer.
//!
//! Call [`init`] once at startup and keep the returned [`LogGuard`] alive;
//! dropping it flushes buffered lines and stops the writer thread. Named
//! loggers are plain `tracing` targets.
//!
//! Each event becomes one line on stdout:
//!
//! ```text
//! {"timestamp":"2024-05-01T10:00:00.000000+03:00","level":"INFO",
//!  "source":"app::users","message":"created id=7"}
//! ```
//!
//! (wrapped here; the real line has no break)

use crate::error::ConfigError;
use crate::settings::LogSettings;
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Keeps the log writer running. Drop to flush and shut it down.
#[must_use = "dropping the guard stops log delivery"]
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Install the global JSON subscriber. Fails if one is already installed.
pub fn init(settings: &LogSettings) -> Result<LogGuard, ConfigError> {
    let filter = EnvFilter::try_new(&settings.filter)
        .map_err(|e| ConfigError::Logging(format!("invalid filter {:?}: {}", settings.filter, e)))?;
    let (writer, worker) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .event_format(JsonLineFormat)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;
    Ok(LogGuard { _worker: worker })
}

/// Formats events as `{timestamp, level, source, message}` objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLineFormat;

impl<S, N> FormatEvent<S, N> for JsonLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut fields = MessageVisitor::default();
        event.record(&mut fields);
        let source = meta.module_path().unwrap_or_else(|| meta.target());
        let line = render_line(&Local::now(), meta.level(), source, &fields.into_message());
        writeln!(writer, "{}", line)
    }
}

fn render_line<Tz: TimeZone>(
    at: &DateTime<Tz>,
    level: &Level,
    source: &str,
    message: &str,
) -> String
where
    Tz::Offset: fmt::Display,
{
    serde_json::json!({
        "timestamp": at.to_rfc3339_opts(SecondsFormat::Micros, false),
        "level": level.as_str(),
        "source": source,
        "message": message,
    })
    .to_string()
}

/// Collects the message and appends other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    extra: Vec<(&'static str, String)>,
}

impl MessageVisitor {
    fn into_message(self) -> String {
        let mut out = self.message;
        for (key, value) in self.extra {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(&value);
        }
        out
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.extra.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.extra.push((field.name(), format!("{:?}", value)));
        }
    }
}
