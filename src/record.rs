use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use crate::writer::JsonValue;

/// Upper bound on the number of links followed in an exception chain.
pub const MAX_CAUSE_DEPTH: usize = 64;

/// A single log event as seen by the encoder.
///
/// The encoder only ever reads from this value. Fields that a logging
/// framework may not provide are optional or empty collections; the mapper
/// for such a field contributes nothing when the data is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Nanosecond-of-second of the timestamp, if the source has that precision.
    pub nanos: Option<u32>,
    pub sequence_number: u64,
    pub level: String,
    pub thread_name: Option<String>,
    pub logger_name: String,
    /// Message with its arguments substituted.
    pub formatted_message: String,
    /// Raw message template, e.g. `"message {}"`.
    pub message: Option<String>,
    pub markers: Vec<String>,
    /// Context properties (MDC). Values may be absent.
    pub mdc: BTreeMap<String, Option<String>>,
    pub key_values: Vec<KeyValuePair>,
    /// Call stack at the logging site, innermost frame first.
    pub caller_data: Vec<StackFrame>,
    pub throwable: Option<ThrowableProxy>,
}

impl LogEvent {
    pub fn new(
        level: impl Into<String>,
        logger_name: impl Into<String>,
        formatted_message: impl Into<String>,
    ) -> Self {
        LogEvent {
            level: level.into(),
            logger_name: logger_name.into(),
            formatted_message: formatted_message.into(),
            ..Default::default()
        }
    }
}

/// A structured key/value argument attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: Option<String>,
    pub value: Option<FieldValue>,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        KeyValuePair {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }
}

/// Value of a key/value pair. Numeric variants are written as JSON numbers,
/// the rest as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl JsonValue for FieldValue {
    fn write_json(&self, out: &mut String) {
        match self {
            FieldValue::I64(v) => v.write_json(out),
            FieldValue::U64(v) => v.write_json(out),
            FieldValue::F64(v) => v.write_json(out),
            FieldValue::Bool(v) => v.write_json(out),
            FieldValue::Str(v) => v.write_json(out),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::I64(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::U64(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// One frame of a call stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub class_name: String,
    pub method_name: String,
}

impl StackFrame {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        file: Option<&str>,
        line: Option<u32>,
    ) -> Self {
        StackFrame {
            file: file.map(str::to_string),
            line,
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.class_name, self.method_name)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line})"),
            (Some(file), None) => write!(f, "{file})"),
            (None, _) => f.write_str("Unknown Source)"),
        }
    }
}

/// One link of an exception chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrowableProxy {
    pub class_name: String,
    pub message: Option<String>,
    pub frames: Vec<StackFrame>,
    pub cause: Option<Box<ThrowableProxy>>,
}

impl ThrowableProxy {
    pub fn new(class_name: impl Into<String>, message: Option<&str>) -> Self {
        ThrowableProxy {
            class_name: class_name.into(),
            message: message.map(str::to_string),
            frames: Vec::new(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: ThrowableProxy) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Build a chain from an error and its `source()` links.
    ///
    /// Rust errors carry no class name; the leading identifier of the
    /// error's `Debug` output is used instead (`Custom`, `ParseIntError`, ...).
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut links = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            if links.len() == MAX_CAUSE_DEPTH {
                break;
            }
            links.push(ThrowableProxy::new(type_label(e), Some(e.to_string().as_str())));
            current = e.source();
        }

        links
            .into_iter()
            .rev()
            .fold(None, |cause: Option<ThrowableProxy>, mut link| {
                link.cause = cause.map(Box::new);
                Some(link)
            })
            .unwrap_or_else(|| ThrowableProxy::new("Error", None))
    }

    /// Iterate over the chain starting at `self`, at most
    /// [`MAX_CAUSE_DEPTH`] + 1 links.
    pub fn chain(&self) -> impl Iterator<Item = &ThrowableProxy> {
        std::iter::successors(Some(self), |t| t.cause.as_deref()).take(MAX_CAUSE_DEPTH + 1)
    }

    /// Innermost link of the chain. When the chain is longer than
    /// [`MAX_CAUSE_DEPTH`] the last link reached is returned.
    pub fn root_cause(&self) -> &ThrowableProxy {
        let mut current = self;
        for _ in 0..MAX_CAUSE_DEPTH {
            match current.cause.as_deref() {
                Some(cause) => current = cause,
                None => break,
            }
        }
        current
    }

    /// Render the whole chain as multi-line text:
    ///
    /// ```text
    /// app.Error: outer
    /// 	at app.Service.run(service.rs:10)
    /// Caused by: io.Error: inner
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (idx, link) in self.chain().enumerate() {
            if idx > 0 {
                out.push_str("\nCaused by: ");
            }
            out.push_str(&link.class_name);
            if let Some(message) = &link.message {
                out.push_str(": ");
                out.push_str(message);
            }
            for frame in &link.frames {
                out.push_str("\n\tat ");
                out.push_str(&frame.to_string());
            }
        }
        out
    }
}

fn type_label(err: &dyn Error) -> String {
    let debug = format!("{err:?}");
    let label: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if label.is_empty() {
        "Error".to_string()
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(len: usize) -> ThrowableProxy {
        (0..len)
            .rev()
            .fold(None, |cause: Option<ThrowableProxy>, idx| {
                let link = ThrowableProxy::new(format!("E{idx}"), Some(format!("m{idx}").as_str()));
                Some(match cause {
                    Some(cause) => link.with_cause(cause),
                    None => link,
                })
            })
            .expect("non-empty chain")
    }

    #[test]
    fn root_cause_of_single_exception_is_itself() {
        let t = ThrowableProxy::new("java.io.IOException", Some("Example Exception"));
        assert_eq!(t.root_cause().class_name, "java.io.IOException");
    }

    #[test]
    fn root_cause_follows_chain_to_the_end() {
        let t = chain_of(3);
        let root = t.root_cause();
        assert_eq!(root.class_name, "E2");
        assert_eq!(root.message.as_deref(), Some("m2"));
    }

    #[test]
    fn root_cause_walk_is_bounded() {
        let t = chain_of(MAX_CAUSE_DEPTH * 3);
        assert_eq!(t.root_cause().class_name, format!("E{MAX_CAUSE_DEPTH}"));
        assert_eq!(t.chain().count(), MAX_CAUSE_DEPTH + 1);
    }

    #[test]
    fn render_includes_frames_and_causes() {
        let t = ThrowableProxy::new("app.Error", Some("outer"))
            .with_frame(StackFrame::new("app.Service", "run", Some("service.rs"), Some(10)))
            .with_cause(
                ThrowableProxy::new("io.Error", None)
                    .with_frame(StackFrame::new("io.File", "read", None, None)),
            );
        assert_eq!(
            t.render(),
            "app.Error: outer\n\tat app.Service.run(service.rs:10)\nCaused by: io.Error\n\tat io.File.read(Unknown Source)"
        );
    }

    #[derive(Debug)]
    struct Outer(std::num::ParseIntError);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("could not parse port")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn from_error_follows_sources() {
        let inner = "x".parse::<u16>().expect_err("not a number");
        let t = ThrowableProxy::from_error(&Outer(inner));
        assert_eq!(t.class_name, "Outer");
        assert_eq!(t.message.as_deref(), Some("could not parse port"));
        let root = t.root_cause();
        assert_eq!(root.class_name, "ParseIntError");
        assert_eq!(root.message.as_deref(), Some("invalid digit found in string"));
    }
}
