//! Minimal append-only JSON object writer.
//!
//! [`JsonWriter`] produces exactly one JSON object directly into a `String`
//! buffer, without building an intermediate tree. Nesting is bounded by
//! [`MAX_DEPTH`]; the only source of nesting is the static structure of the
//! mapper pipeline, so exceeding it (or writing after [`JsonWriter::close`])
//! is a programming error and panics.

use std::borrow::Cow;
use std::fmt::{self, Display, Write as _};

/// Capacity of the comma-flag stack. Depth 0 is the top-level object.
pub const MAX_DEPTH: usize = 8;

/// Streaming writer for a single JSON object.
///
/// ```
/// use tracing_json_encoder::writer::JsonWriter;
///
/// let mut out = String::new();
/// let mut json = JsonWriter::new(&mut out);
/// json.append("level", "INFO")
///     .append_object("caller", |json| {
///         json.append("line", &42u32);
///     });
/// json.close();
/// assert_eq!(out, r#"{"level":"INFO","caller":{"line":42}}"#);
/// ```
pub struct JsonWriter<'a> {
    out: &'a mut String,
    /// `has_entry[d]` is set once an entry was written at depth `d`.
    has_entry: [bool; MAX_DEPTH],
    depth: usize,
    closed: bool,
}

impl<'a> JsonWriter<'a> {
    /// Open a new object, emitting `{` into `out`.
    pub fn new(out: &'a mut String) -> Self {
        out.push('{');
        Self {
            out,
            has_entry: [false; MAX_DEPTH],
            depth: 0,
            closed: false,
        }
    }

    /// Append `key` with the given value at the current depth.
    pub fn append<V>(&mut self, key: &str, value: &V) -> &mut Self
    where
        V: JsonValue + ?Sized,
    {
        self.write_key(key);
        value.write_json(self.out);
        self
    }

    /// Start a nested object under `key`. Must be balanced by
    /// [`end_object`](Self::end_object).
    pub fn begin_object(&mut self, key: &str) -> &mut Self {
        self.ensure_open();
        assert!(
            self.depth + 1 < MAX_DEPTH,
            "json writer nesting exceeds maximum depth of {MAX_DEPTH}"
        );
        self.write_key(key);
        self.out.push('{');
        self.depth += 1;
        self.has_entry[self.depth] = false;
        self
    }

    /// Finish the innermost nested object.
    pub fn end_object(&mut self) -> &mut Self {
        self.ensure_open();
        assert!(self.depth > 0, "json writer has no nested object to end");
        self.out.push('}');
        self.depth -= 1;
        self.has_entry[self.depth] = true;
        self
    }

    /// Write a nested object under `key`, filled by `build`.
    pub fn append_object<F>(&mut self, key: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.begin_object(key);
        build(self);
        self.end_object()
    }

    /// Emit the closing `}` of the top-level object. Further calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        assert!(
            self.depth == 0,
            "json writer closed with {} nested object(s) still open",
            self.depth
        );
        self.out.push('}');
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Current nesting depth (0 = top-level object).
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn write_key(&mut self, key: &str) {
        self.ensure_open();
        if self.has_entry[self.depth] {
            self.out.push(',');
        }
        self.has_entry[self.depth] = true;
        write_quoted(self.out, key);
        self.out.push(':');
    }

    fn ensure_open(&self) {
        assert!(!self.closed, "json writer already closed");
    }
}

impl fmt::Debug for JsonWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonWriter")
            .field("depth", &self.depth)
            .field("closed", &self.closed)
            .finish()
    }
}

/// A value that knows how to render itself as a JSON literal.
///
/// Numbers are written unquoted, `None` as `null` and everything else as an
/// escaped, quoted string.
pub trait JsonValue {
    fn write_json(&self, out: &mut String);
}

impl JsonValue for str {
    fn write_json(&self, out: &mut String) {
        write_quoted(out, self);
    }
}

impl JsonValue for String {
    fn write_json(&self, out: &mut String) {
        write_quoted(out, self);
    }
}

impl JsonValue for Cow<'_, str> {
    fn write_json(&self, out: &mut String) {
        write_quoted(out, self);
    }
}

impl JsonValue for char {
    fn write_json(&self, out: &mut String) {
        let mut buf = [0u8; 4];
        write_quoted(out, self.encode_utf8(&mut buf));
    }
}

// Booleans are not numbers: they go out as their quoted textual form.
impl JsonValue for bool {
    fn write_json(&self, out: &mut String) {
        write_quoted(out, if *self { "true" } else { "false" });
    }
}

impl<T: JsonValue + ?Sized> JsonValue for &T {
    fn write_json(&self, out: &mut String) {
        (**self).write_json(out);
    }
}

impl<T: JsonValue> JsonValue for Option<T> {
    fn write_json(&self, out: &mut String) {
        match self {
            Some(value) => value.write_json(out),
            None => out.push_str("null"),
        }
    }
}

macro_rules! integer_json_value {
    ($($ty:ty),*) => {
        $(
            impl JsonValue for $ty {
                fn write_json(&self, out: &mut String) {
                    let _ = write!(out, "{}", self);
                }
            }
        )*
    };
}

integer_json_value!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float_json_value {
    ($($ty:ty),*) => {
        $(
            impl JsonValue for $ty {
                // NaN and infinities have no JSON literal.
                fn write_json(&self, out: &mut String) {
                    if self.is_finite() {
                        let _ = write!(out, "{}", self);
                    } else {
                        out.push_str("null");
                    }
                }
            }
        )*
    };
}

float_json_value!(f32, f64);

/// Wraps any [`Display`] value so it is written as an escaped JSON string.
#[derive(Debug, Clone, Copy)]
pub struct Text<T>(pub T);

impl<T: Display> JsonValue for Text<T> {
    fn write_json(&self, out: &mut String) {
        write_quoted(out, &self.0.to_string());
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    escape_into(out, s);
    out.push('"');
}

/// Escape `input` for use inside a JSON string literal, appending to `out`.
///
/// `"`, `\` and `/` are backslash-prefixed, the five short control escapes
/// are used where they exist and every other code point below 0x20 becomes a
/// `\u00xx` escape. Everything else, non-ASCII included, passes through.
pub fn escape_into(out: &mut String, input: &str) {
    for ch in input.chars() {
        match ch {
            '"' | '\\' | '/' => {
                out.push('\\');
                out.push(ch);
            }
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

/// Escape a string so it can be embedded into JSON output.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    escape_into(&mut out, input);
    out
}
