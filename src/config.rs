use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::template::DEFAULT_MESSAGE_TEMPLATE;

/// How the `timestamp` field is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// Milliseconds since the Unix epoch, as a JSON number.
    #[default]
    EpochMillis,
    /// A `strftime` pattern rendered in UTC, as a JSON string,
    /// e.g. `"%Y-%m-%dT%H:%M:%S%.6f%z"`.
    Pattern(String),
}

/// Declarative encoder configuration.
///
/// Every `include_*` toggle enables one field of the output document; the
/// fields are always written in the order the toggles are declared here,
/// followed by the static fields and any custom mappers.
///
/// The struct deserializes with `#[serde(default)]`, so a configuration
/// source only needs to name the toggles it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub include_timestamp: bool,
    pub include_nanoseconds: bool,
    pub include_sequence_number: bool,
    pub include_level: bool,
    pub include_thread: bool,
    pub include_logger: bool,
    pub include_message: bool,
    pub include_raw_message: bool,
    pub include_markers: bool,
    pub include_mdc: bool,
    pub include_key_values: bool,
    pub include_caller: bool,
    pub include_stacktrace: bool,
    pub include_root_cause: bool,
    pub timestamp_format: TimestampFormat,
    pub message_template: String,
    /// Static fields in `key:value` form.
    pub static_fields: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            include_timestamp: true,
            include_nanoseconds: false,
            include_sequence_number: false,
            include_level: true,
            include_thread: true,
            include_logger: true,
            include_message: true,
            include_raw_message: false,
            include_markers: true,
            include_mdc: true,
            include_key_values: true,
            include_caller: false,
            include_stacktrace: true,
            include_root_cause: false,
            timestamp_format: TimestampFormat::EpochMillis,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            static_fields: Vec::new(),
        }
    }
}

/// Non-fatal configuration problem. The offending entry is dropped and
/// activation carries on.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    #[error("staticField must be in format key:value - rejecting '{0}'")]
    MalformedStaticField(String),

    #[error("staticField key must not be empty")]
    EmptyStaticFieldKey,

    #[error("static field with key '{0}' is already set")]
    DuplicateStaticField(String),

    #[error("invalid timestamp pattern '{0}', falling back to epoch millis")]
    InvalidTimestampPattern(String),

    #[error("invalid message template '{0}', falling back to '{{message}}'")]
    InvalidMessageTemplate(String),

    #[error("invalid boolean '{value}' for {key}, keeping default")]
    InvalidBool { key: String, value: String },
}

/// Split a `key:value` entry on its first colon and trim both halves.
pub fn parse_static_field(entry: &str) -> Result<(String, String), ConfigWarning> {
    let (key, value) = entry
        .split_once(':')
        .ok_or_else(|| ConfigWarning::MalformedStaticField(entry.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigWarning::EmptyStaticFieldKey);
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parse every entry, keeping the first occurrence of each key.
pub(crate) fn collect_static_fields(
    entries: &[String],
    warnings: &mut Vec<ConfigWarning>,
) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_static_field(entry) {
            Ok((key, _)) if fields.iter().any(|(k, _)| *k == key) => {
                warnings.push(ConfigWarning::DuplicateStaticField(key));
            }
            Ok(field) => fields.push(field),
            Err(warning) => warnings.push(warning),
        }
    }
    fields
}

/// Render `at` with a `strftime` pattern. `None` when chrono rejects the
/// pattern, which includes parse-only specifiers such as `%#z`.
pub(crate) fn format_timestamp(at: &DateTime<Utc>, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", at.format(pattern)).ok()?;
    Some(out)
}

/// A pattern is usable only if a sample instant can be rendered with it.
pub(crate) fn validate_pattern(pattern: &str) -> Result<(), ConfigWarning> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 123_456_789)
        .and_then(|sample| format_timestamp(&sample, pattern))
        .map(drop)
        .ok_or_else(|| ConfigWarning::InvalidTimestampPattern(pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_colon_and_trims() {
        assert_eq!(
            parse_static_field(" url : http://example.com:8080 "),
            Ok(("url".to_string(), "http://example.com:8080".to_string()))
        );
        assert_eq!(
            parse_static_field("empty:"),
            Ok(("empty".to_string(), String::new()))
        );
    }

    #[test]
    fn rejects_entries_without_colon() {
        assert_eq!(
            parse_static_field("foobar"),
            Err(ConfigWarning::MalformedStaticField("foobar".to_string()))
        );
    }

    #[test]
    fn rejects_empty_key() {
        assert_eq!(parse_static_field("  :bar"), Err(ConfigWarning::EmptyStaticFieldKey));
    }

    #[test]
    fn first_static_field_wins() {
        let mut warnings = Vec::new();
        let fields = collect_static_fields(
            &["foo:bar".to_string(), "broken".to_string(), "foo:baz".to_string()],
            &mut warnings,
        );
        assert_eq!(fields, vec![("foo".to_string(), "bar".to_string())]);
        assert_eq!(
            warnings,
            vec![
                ConfigWarning::MalformedStaticField("broken".to_string()),
                ConfigWarning::DuplicateStaticField("foo".to_string()),
            ]
        );
    }

    #[test]
    fn validates_timestamp_patterns() {
        assert!(validate_pattern("%Y-%m-%dT%H:%M:%S%.6f%z").is_ok());
        assert!(validate_pattern("%Q").is_err());
        assert!(validate_pattern("%Y-%m-%dT%H:%M:%S%#z").is_err());
    }

    #[test]
    fn defaults_apply_to_partial_config() {
        let config: EncoderConfig = serde_json::from_str(
            r#"{"include_caller": true, "timestamp_format": {"pattern": "%s"}, "static_fields": ["env:prod"]}"#,
        )
        .expect("valid config");
        assert!(config.include_caller);
        assert!(config.include_level);
        assert_eq!(config.timestamp_format, TimestampFormat::Pattern("%s".to_string()));
        assert_eq!(config.static_fields, vec!["env:prod".to_string()]);
        assert_eq!(config.message_template, DEFAULT_MESSAGE_TEMPLATE);
    }
}
