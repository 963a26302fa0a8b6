//! Single-line JSON encoding of structured log events.
//!
//! The core is [`encoder::JsonLogEncoder`]: a fixed pipeline of field
//! [`mapper::Mapper`]s, assembled once from an [`config::EncoderConfig`],
//! that writes each [`record::LogEvent`] through a streaming
//! [`writer::JsonWriter`]. With the `layer` feature (default) the crate also
//! provides a `tracing` layer that ships encoded lines to a [`sink::LogSink`].

pub mod config;
pub mod encoder;
pub mod env;
pub mod mapper;
pub mod record;
pub mod template;
pub mod writer;

#[cfg(feature = "layer")]
pub mod sink;
#[cfg(feature = "layer")]
pub mod layer;
#[cfg(feature = "layer")]
pub mod init;
#[cfg(feature = "layer")]
pub mod noop_sink;
#[cfg(feature = "layer")]
pub mod stdout_sink;

pub use config::{ConfigWarning, EncoderConfig, TimestampFormat};
pub use encoder::{EncoderBuilder, JsonLogEncoder};
pub use record::{FieldValue, KeyValuePair, LogEvent, StackFrame, ThrowableProxy};
pub use template::MessageTemplate;
pub use writer::JsonWriter;
