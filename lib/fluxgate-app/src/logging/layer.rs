use std::fmt::{self, Write as _};

use chrono::{SecondsFormat, Utc};
use tracing::{field, Event, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, Layer, MakeWriter},
    layer,
    registry::LookupSpan,
    Layer as _,
};

use super::LoggingConfiguration;

pub fn build_formatting_layer<S, W>(config: &LoggingConfiguration, writer: W) -> Box<dyn layer::Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    if config.log_format_json() {
        Layer::new()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(writer)
            .boxed()
    } else {
        Layer::new().event_format(TextFormatter).with_writer(writer).boxed()
    }
}

/// Writes events as `<time> <LEVEL> <target>: <message> key=value ...`.
struct TextFormatter;

impl<S, N> FormatEvent<S, N> for TextFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, _ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let metadata = event.metadata();

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        write!(
            writer,
            "{} {:>5} {}: {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            metadata.level(),
            metadata.target(),
            fields.message
        )?;
        if !fields.rest.is_empty() {
            write!(writer, " {}", fields.rest)?;
        }

        writeln!(writer)
    }
}

/// Splits an event's fields into its message and the remaining `key=value` pairs.
#[derive(Default)]
struct FieldCollector {
    message: String,
    rest: String,
}

impl FieldCollector {
    fn push(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if name == "message" {
            let _ = self.message.write_fmt(value);
            return;
        }

        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
        self.rest.push_str(name);
        self.rest.push('=');
        let _ = self.rest.write_fmt(value);
    }
}

impl field::Visit for FieldCollector {
    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() != "message" && value.contains(char::is_whitespace) {
            self.push(field.name(), format_args!("{:?}", value));
        } else {
            self.push(field.name(), format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        self.push(field.name(), format_args!("{:?}", value));
    }
}
