//! Message templates for the `message` field.
//!
//! A template mixes literal text with placeholders: `{message}`,
//! `{raw_message}`, `{level}`, `{logger}` and `{thread}`. `{{` and `}}` are
//! literal braces. Templates are compiled once when the encoder is built.

use std::fmt;
use std::sync::Arc;

use crate::config::ConfigWarning;
use crate::record::LogEvent;

pub const DEFAULT_MESSAGE_TEMPLATE: &str = "{message}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Message,
    RawMessage,
    Level,
    Logger,
    Thread,
}

/// A compiled message template.
#[derive(Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    segments: Arc<[Segment]>,
}

impl MessageTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigWarning> {
        let invalid = || ConfigWarning::InvalidMessageTemplate(template.to_string());
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(invalid()),
                        }
                    }
                    let placeholder = match name.trim() {
                        "message" => Segment::Message,
                        "raw_message" => Segment::RawMessage,
                        "level" => Segment::Level,
                        "logger" => Segment::Logger,
                        "thread" => Segment::Thread,
                        _ => return Err(invalid()),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(placeholder);
                }
                '}' => return Err(invalid()),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(MessageTemplate {
            segments: segments.into(),
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the template is exactly `{message}`.
    pub fn is_plain(&self) -> bool {
        matches!(&*self.segments, [Segment::Message])
    }

    /// Absent attributes render as empty text.
    pub fn render_into(&self, event: &LogEvent, out: &mut String) {
        for segment in self.segments.iter() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Message => out.push_str(&event.formatted_message),
                Segment::RawMessage => out.push_str(event.message.as_deref().unwrap_or_default()),
                Segment::Level => out.push_str(&event.level),
                Segment::Logger => out.push_str(&event.logger_name),
                Segment::Thread => out.push_str(event.thread_name.as_deref().unwrap_or_default()),
            }
        }
    }

    pub fn render(&self, event: &LogEvent) -> String {
        let mut out = String::with_capacity(event.formatted_message.len() + 32);
        self.render_into(event, &mut out);
        out
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        MessageTemplate {
            segments: Arc::from(vec![Segment::Message]),
        }
    }
}

impl fmt::Debug for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.segments.iter()).finish()
    }
}
