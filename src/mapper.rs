//! Field mappers: each one reads a single attribute off a [`LogEvent`] and
//! writes zero or more entries into a [`JsonWriter`].

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::config::{format_timestamp, TimestampFormat};
use crate::record::LogEvent;
use crate::template::MessageTemplate;
use crate::writer::JsonWriter;

/// User supplied mapper, run after all built-in fields.
///
/// A custom mapper may append entries and nest objects, but it must leave the
/// writer at the depth it found it.
pub type CustomMapper = Arc<dyn Fn(&mut JsonWriter<'_>, &LogEvent) + Send + Sync>;

/// Key used for key/value pairs whose key is absent.
pub const NULL_KEY: &str = "null";

/// One step of the encoder pipeline.
#[derive(Clone)]
pub enum Mapper {
    Timestamp(TimestampFormat),
    Nanoseconds,
    SequenceNumber,
    Level,
    Thread,
    Logger,
    Message(MessageTemplate),
    RawMessage,
    Markers,
    Mdc,
    KeyValues,
    Caller,
    StackTrace,
    RootCause,
    StaticFields(Arc<[(String, String)]>),
    Custom(CustomMapper),
}

impl Mapper {
    pub fn apply(&self, json: &mut JsonWriter<'_>, event: &LogEvent) {
        match self {
            Mapper::Timestamp(format) => write_timestamp(json, event, format),
            Mapper::Nanoseconds => {
                if let Some(nanos) = event.nanos {
                    json.append("nanoseconds", &nanos);
                }
            }
            Mapper::SequenceNumber => {
                json.append("sequenceNumber", &event.sequence_number);
            }
            Mapper::Level => {
                json.append("level", &event.level);
            }
            Mapper::Thread => {
                if let Some(thread) = &event.thread_name {
                    json.append("thread", thread);
                }
            }
            Mapper::Logger => {
                json.append("logger", &event.logger_name);
            }
            Mapper::Message(template) => {
                if template.is_plain() {
                    json.append("message", &event.formatted_message);
                } else {
                    json.append("message", &template.render(event));
                }
            }
            Mapper::RawMessage => {
                if let Some(raw) = &event.message {
                    json.append("rawMessage", raw);
                }
            }
            Mapper::Markers => write_markers(json, &event.markers),
            Mapper::Mdc => {
                if !event.mdc.is_empty() {
                    json.append_object("mdc", |json| {
                        for (key, value) in &event.mdc {
                            json.append(key, value);
                        }
                    });
                }
            }
            Mapper::KeyValues => {
                if !event.key_values.is_empty() {
                    json.append_object("keyValues", |json| {
                        for pair in &event.key_values {
                            json.append(pair.key.as_deref().unwrap_or(NULL_KEY), &pair.value);
                        }
                    });
                }
            }
            Mapper::Caller => {
                if let Some(frame) = event.caller_data.first() {
                    json.append_object("caller", |json| {
                        json.append("file", &frame.file)
                            .append("line", &frame.line)
                            .append("class", &frame.class_name)
                            .append("method", &frame.method_name);
                    });
                }
            }
            Mapper::StackTrace => {
                if let Some(throwable) = &event.throwable {
                    json.append("stacktrace", &throwable.render());
                }
            }
            Mapper::RootCause => {
                if let Some(throwable) = &event.throwable {
                    let root = throwable.root_cause();
                    json.append_object("rootCause", |json| {
                        json.append("className", &root.class_name)
                            .append("message", &root.message);
                    });
                }
            }
            Mapper::StaticFields(fields) => {
                if !fields.is_empty() {
                    json.append_object("staticFields", |json| {
                        for (key, value) in fields.iter() {
                            json.append(key, value);
                        }
                    });
                }
            }
            Mapper::Custom(mapper) => {
                let depth = json.depth();
                mapper(json, event);
                assert_eq!(json.depth(), depth, "custom mapper left a nested object open");
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapper::Timestamp(_) => "timestamp",
            Mapper::Nanoseconds => "nanoseconds",
            Mapper::SequenceNumber => "sequenceNumber",
            Mapper::Level => "level",
            Mapper::Thread => "thread",
            Mapper::Logger => "logger",
            Mapper::Message(_) => "message",
            Mapper::RawMessage => "rawMessage",
            Mapper::Markers => "markers",
            Mapper::Mdc => "mdc",
            Mapper::KeyValues => "keyValues",
            Mapper::Caller => "caller",
            Mapper::StackTrace => "stacktrace",
            Mapper::RootCause => "rootCause",
            Mapper::StaticFields(_) => "staticFields",
            Mapper::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapper::Timestamp(format) => f.debug_tuple("Timestamp").field(format).finish(),
            Mapper::Message(template) => f.debug_tuple("Message").field(template).finish(),
            Mapper::StaticFields(fields) => f.debug_tuple("StaticFields").field(fields).finish(),
            other => f.write_str(other.name()),
        }
    }
}

fn write_timestamp(json: &mut JsonWriter<'_>, event: &LogEvent, format: &TimestampFormat) {
    if let TimestampFormat::Pattern(pattern) = format {
        let nanos = event
            .nanos
            .unwrap_or_else(|| event.timestamp.rem_euclid(1000) as u32 * 1_000_000);
        let rendered = DateTime::<Utc>::from_timestamp(event.timestamp.div_euclid(1000), nanos)
            .and_then(|at| format_timestamp(&at, pattern));
        if let Some(text) = rendered {
            json.append("timestamp", &text);
            return;
        }
    }
    json.append("timestamp", &event.timestamp);
}

// Presence flags: a repeated marker name is written once.
fn write_markers(json: &mut JsonWriter<'_>, markers: &[String]) {
    if markers.is_empty() {
        return;
    }
    json.append_object("markers", |json| {
        for (idx, marker) in markers.iter().enumerate() {
            if !markers[..idx].contains(marker) {
                json.append(marker, &1u8);
            }
        }
    });
}
