//! Environment variable names used by this crate for convenient
//! configuration of the encoder from microservices.
//!
//! These are purely helpers; [`EncoderConfig`] itself remains decoupled from
//! environment access.

use crate::config::{ConfigWarning, EncoderConfig, TimestampFormat};

pub const LOG_JSON_INCLUDE_TIMESTAMP_ENV: &str = "LOG_JSON_INCLUDE_TIMESTAMP";
pub const LOG_JSON_INCLUDE_NANOSECONDS_ENV: &str = "LOG_JSON_INCLUDE_NANOSECONDS";
pub const LOG_JSON_INCLUDE_SEQUENCE_NUMBER_ENV: &str = "LOG_JSON_INCLUDE_SEQUENCE_NUMBER";
pub const LOG_JSON_INCLUDE_LEVEL_ENV: &str = "LOG_JSON_INCLUDE_LEVEL";
pub const LOG_JSON_INCLUDE_THREAD_ENV: &str = "LOG_JSON_INCLUDE_THREAD";
pub const LOG_JSON_INCLUDE_LOGGER_ENV: &str = "LOG_JSON_INCLUDE_LOGGER";
pub const LOG_JSON_INCLUDE_MESSAGE_ENV: &str = "LOG_JSON_INCLUDE_MESSAGE";
pub const LOG_JSON_INCLUDE_RAW_MESSAGE_ENV: &str = "LOG_JSON_INCLUDE_RAW_MESSAGE";
pub const LOG_JSON_INCLUDE_MARKERS_ENV: &str = "LOG_JSON_INCLUDE_MARKERS";
pub const LOG_JSON_INCLUDE_MDC_ENV: &str = "LOG_JSON_INCLUDE_MDC";
pub const LOG_JSON_INCLUDE_KEY_VALUES_ENV: &str = "LOG_JSON_INCLUDE_KEY_VALUES";
pub const LOG_JSON_INCLUDE_CALLER_ENV: &str = "LOG_JSON_INCLUDE_CALLER";
pub const LOG_JSON_INCLUDE_STACKTRACE_ENV: &str = "LOG_JSON_INCLUDE_STACKTRACE";
pub const LOG_JSON_INCLUDE_ROOT_CAUSE_ENV: &str = "LOG_JSON_INCLUDE_ROOT_CAUSE";

/// `epoch_millis` (default) or a `strftime` pattern.
pub const LOG_JSON_TIMESTAMP_FORMAT_ENV: &str = "LOG_JSON_TIMESTAMP_FORMAT";

/// Layout of the `message` field, e.g. `[{level}] {message}`.
pub const LOG_JSON_MESSAGE_TEMPLATE_ENV: &str = "LOG_JSON_MESSAGE_TEMPLATE";

/// Comma separated `key:value` entries, e.g. `service:auth,env:prod`.
pub const LOG_JSON_STATIC_FIELDS_ENV: &str = "LOG_JSON_STATIC_FIELDS";

const TOGGLE_ENVS: [&str; 14] = [
    LOG_JSON_INCLUDE_TIMESTAMP_ENV,
    LOG_JSON_INCLUDE_NANOSECONDS_ENV,
    LOG_JSON_INCLUDE_SEQUENCE_NUMBER_ENV,
    LOG_JSON_INCLUDE_LEVEL_ENV,
    LOG_JSON_INCLUDE_THREAD_ENV,
    LOG_JSON_INCLUDE_LOGGER_ENV,
    LOG_JSON_INCLUDE_MESSAGE_ENV,
    LOG_JSON_INCLUDE_RAW_MESSAGE_ENV,
    LOG_JSON_INCLUDE_MARKERS_ENV,
    LOG_JSON_INCLUDE_MDC_ENV,
    LOG_JSON_INCLUDE_KEY_VALUES_ENV,
    LOG_JSON_INCLUDE_CALLER_ENV,
    LOG_JSON_INCLUDE_STACKTRACE_ENV,
    LOG_JSON_INCLUDE_ROOT_CAUSE_ENV,
];

/// Read the encoder configuration from the process environment.
pub fn encoder_config_from_env() -> (EncoderConfig, Vec<ConfigWarning>) {
    encoder_config_from_lookup(|key| std::env::var(key).ok())
}

/// Build an [`EncoderConfig`] from an arbitrary variable lookup. Unset
/// variables keep their defaults.
pub fn encoder_config_from_lookup<F>(lookup: F) -> (EncoderConfig, Vec<ConfigWarning>)
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = EncoderConfig::default();
    let mut warnings = Vec::new();

    for key in TOGGLE_ENVS {
        let Some(raw) = lookup(key) else { continue };
        match (parse_bool(&raw), toggle_mut(&mut config, key)) {
            (Some(value), Some(slot)) => *slot = value,
            _ => warnings.push(ConfigWarning::InvalidBool {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    if let Some(raw) = lookup(LOG_JSON_TIMESTAMP_FORMAT_ENV) {
        let raw = raw.trim();
        config.timestamp_format = if raw.is_empty() || raw.eq_ignore_ascii_case("epoch_millis") {
            TimestampFormat::EpochMillis
        } else {
            TimestampFormat::Pattern(raw.to_string())
        };
    }

    if let Some(raw) = lookup(LOG_JSON_MESSAGE_TEMPLATE_ENV) {
        if !raw.is_empty() {
            config.message_template = raw;
        }
    }

    if let Some(raw) = lookup(LOG_JSON_STATIC_FIELDS_ENV) {
        config.static_fields = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();
    }

    (config, warnings)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn toggle_mut<'a>(config: &'a mut EncoderConfig, key: &str) -> Option<&'a mut bool> {
    let slot = match key {
        LOG_JSON_INCLUDE_TIMESTAMP_ENV => &mut config.include_timestamp,
        LOG_JSON_INCLUDE_NANOSECONDS_ENV => &mut config.include_nanoseconds,
        LOG_JSON_INCLUDE_SEQUENCE_NUMBER_ENV => &mut config.include_sequence_number,
        LOG_JSON_INCLUDE_LEVEL_ENV => &mut config.include_level,
        LOG_JSON_INCLUDE_THREAD_ENV => &mut config.include_thread,
        LOG_JSON_INCLUDE_LOGGER_ENV => &mut config.include_logger,
        LOG_JSON_INCLUDE_MESSAGE_ENV => &mut config.include_message,
        LOG_JSON_INCLUDE_RAW_MESSAGE_ENV => &mut config.include_raw_message,
        LOG_JSON_INCLUDE_MARKERS_ENV => &mut config.include_markers,
        LOG_JSON_INCLUDE_MDC_ENV => &mut config.include_mdc,
        LOG_JSON_INCLUDE_KEY_VALUES_ENV => &mut config.include_key_values,
        LOG_JSON_INCLUDE_CALLER_ENV => &mut config.include_caller,
        LOG_JSON_INCLUDE_STACKTRACE_ENV => &mut config.include_stacktrace,
        LOG_JSON_INCLUDE_ROOT_CAUSE_ENV => &mut config.include_root_cause,
        _ => return None,
    };
    Some(slot)
}
