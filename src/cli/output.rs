use crate::query::{LogEvent, LogSequence, StreamDescriptor};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per event: timestamp, stream, message
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

pub fn write_event<W: Write>(out: &mut W, event: &LogEvent, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Text => writeln!(
            out,
            "{} {} {}",
            format_timestamp(event.timestamp()),
            event.stream(),
            event.message().trim_end_matches(['\r', '\n'])
        ),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, event)?;
            writeln!(out)
        }
    }
}

pub fn write_events<W: Write>(out: &mut W, logs: &LogSequence, format: OutputFormat) -> io::Result<()> {
    for event in logs {
        write_event(out, event, format)?;
    }
    out.flush()
}

#[derive(Serialize)]
struct StreamLine<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_event: Option<String>,
}

pub fn write_streams<W: Write>(
    out: &mut W,
    streams: &[StreamDescriptor],
    format: OutputFormat,
) -> io::Result<()> {
    for stream in streams {
        let last_event = stream.last_event.map(format_timestamp);
        match format {
            OutputFormat::Text => writeln!(
                out,
                "{} {}",
                last_event.as_deref().unwrap_or("-"),
                stream.name
            )?,
            OutputFormat::Json => {
                let line = StreamLine {
                    name: &stream.name,
                    last_event,
                };
                serde_json::to_writer(&mut *out, &line)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()
}
