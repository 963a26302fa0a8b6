use std::fmt;
use std::sync::Arc;

use crate::config::{collect_static_fields, validate_pattern, ConfigWarning, EncoderConfig, TimestampFormat};
use crate::mapper::{CustomMapper, Mapper};
use crate::record::LogEvent;
use crate::template::MessageTemplate;
use crate::writer::JsonWriter;

const INITIAL_BUF_SIZE: usize = 128;

#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Encodes [`LogEvent`]s into single-line JSON documents.
///
/// The mapper pipeline is assembled once by [`EncoderBuilder::build`] and is
/// read-only afterwards, so an encoder can be cloned and shared freely
/// between threads. Every call to [`encode`](Self::encode) owns its buffer.
#[derive(Clone)]
pub struct JsonLogEncoder {
    pipeline: Arc<[Mapper]>,
    warnings: Arc<[ConfigWarning]>,
}

impl JsonLogEncoder {
    /// Build an encoder straight from a configuration.
    pub fn new(config: EncoderConfig) -> Self {
        EncoderBuilder::new().config(config).build()
    }

    pub fn builder() -> EncoderBuilder {
        EncoderBuilder::new()
    }

    /// Encode one event: a JSON object followed by [`LINE_SEPARATOR`].
    pub fn encode(&self, event: &LogEvent) -> Vec<u8> {
        let mut out = String::with_capacity(INITIAL_BUF_SIZE);
        self.encode_into(event, &mut out);
        out.into_bytes()
    }

    /// Append the encoded event to `out`.
    pub fn encode_into(&self, event: &LogEvent, out: &mut String) {
        let mut json = JsonWriter::new(out);
        for mapper in self.pipeline.iter() {
            mapper.apply(&mut json, event);
        }
        json.close();
        out.push_str(LINE_SEPARATOR);
    }

    /// Mappers in the order they run.
    pub fn mappers(&self) -> &[Mapper] {
        &self.pipeline
    }

    /// Configuration problems found while the encoder was built.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }
}

impl Default for JsonLogEncoder {
    fn default() -> Self {
        JsonLogEncoder::new(EncoderConfig::default())
    }
}

impl fmt::Debug for JsonLogEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLogEncoder")
            .field("pipeline", &self.pipeline)
            .field("warnings", &self.warnings)
            .finish()
    }
}

/// Collects configuration and custom mappers, then assembles the pipeline.
#[derive(Default)]
pub struct EncoderBuilder {
    config: EncoderConfig,
    custom: Vec<CustomMapper>,
    warnings: Vec<ConfigWarning>,
}

impl EncoderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `LOG_JSON_*` environment variables.
    /// See [`crate::env`] for the variable names.
    pub fn from_env() -> Self {
        let (config, warnings) = crate::env::encoder_config_from_env();
        EncoderBuilder {
            config,
            custom: Vec::new(),
            warnings,
        }
    }

    /// Replace the whole configuration. Static fields added before are kept.
    pub fn config(mut self, config: EncoderConfig) -> Self {
        let mut static_fields = std::mem::take(&mut self.config.static_fields);
        static_fields.extend(config.static_fields.iter().cloned());
        self.config = EncoderConfig {
            static_fields,
            ..config
        };
        self
    }

    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.config.timestamp_format = format;
        self
    }

    /// Layout of the `message` field, e.g. `"[{level}] {message}"`.
    pub fn message_template(mut self, template: impl Into<String>) -> Self {
        self.config.message_template = template.into();
        self
    }

    /// Add a static field in `key:value` form.
    pub fn static_field(mut self, entry: impl Into<String>) -> Self {
        self.config.static_fields.push(entry.into());
        self
    }

    /// Register a custom mapper. Custom mappers run after all built-in
    /// fields, in registration order.
    pub fn mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&mut JsonWriter<'_>, &LogEvent) + Send + Sync + 'static,
    {
        self.custom.push(Arc::new(mapper));
        self
    }

    /// Assemble the pipeline. Configuration problems are logged and kept on
    /// the encoder; they never abort the build.
    pub fn build(self) -> JsonLogEncoder {
        let EncoderBuilder {
            config,
            custom,
            mut warnings,
        } = self;

        let timestamp_format = match config.timestamp_format {
            TimestampFormat::Pattern(pattern) => match validate_pattern(&pattern) {
                Ok(()) => TimestampFormat::Pattern(pattern),
                Err(warning) => {
                    warnings.push(warning);
                    TimestampFormat::EpochMillis
                }
            },
            TimestampFormat::EpochMillis => TimestampFormat::EpochMillis,
        };
        let message_template =
            MessageTemplate::parse(&config.message_template).unwrap_or_else(|warning| {
                warnings.push(warning);
                MessageTemplate::default()
            });
        let static_fields = collect_static_fields(&config.static_fields, &mut warnings);

        let toggles = [
            (config.include_timestamp, Mapper::Timestamp(timestamp_format)),
            (config.include_nanoseconds, Mapper::Nanoseconds),
            (config.include_sequence_number, Mapper::SequenceNumber),
            (config.include_level, Mapper::Level),
            (config.include_thread, Mapper::Thread),
            (config.include_logger, Mapper::Logger),
            (config.include_message, Mapper::Message(message_template)),
            (config.include_raw_message, Mapper::RawMessage),
            (config.include_markers, Mapper::Markers),
            (config.include_mdc, Mapper::Mdc),
            (config.include_key_values, Mapper::KeyValues),
            (config.include_caller, Mapper::Caller),
            (config.include_stacktrace, Mapper::StackTrace),
            (config.include_root_cause, Mapper::RootCause),
        ];

        let mut pipeline: Vec<Mapper> = toggles
            .into_iter()
            .filter_map(|(enabled, mapper)| enabled.then_some(mapper))
            .collect();
        if !static_fields.is_empty() {
            pipeline.push(Mapper::StaticFields(static_fields.into()));
        }
        pipeline.extend(custom.into_iter().map(Mapper::Custom));

        for warning in &warnings {
            tracing::warn!(%warning, "rejected json encoder configuration entry");
        }
        tracing::debug!(
            fields = ?pipeline.iter().map(Mapper::name).collect::<Vec<_>>(),
            "json log encoder activated"
        );

        JsonLogEncoder {
            pipeline: pipeline.into(),
            warnings: warnings.into(),
        }
    }
}
