use crate::encoder::JsonLogEncoder;
use crate::layer::JsonLogLayer;
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// Controls the size of the internal channel, the batch size used when
/// sending to the sink, how often partial batches are flushed, the most
/// verbose level that is encoded, and whether events are additionally
/// printed in human readable form.
///
/// **Fields**
/// - `channel_buffer`: maximum number of encoded lines queued before new
///   lines are dropped.
/// - `batch_size`: number of lines sent to the sink per batch.
/// - `flush_interval`: maximum time between flushes even when the batch is
///   not full.
/// - `min_level`: events more verbose than this level are ignored.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer writing
///   to stderr is installed next to the JSON layer. It goes to stderr so it
///   never interleaves with JSON lines on stdout.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            min_level: Level::INFO,
            enable_stdout: false,
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
}

/// Initialize the global `tracing` subscriber using the provided encoder,
/// sink and [`LayerConfig`].
///
/// **Parameters**
/// - `encoder`: [`JsonLogEncoder`] that turns events into JSON lines.
/// - `sink`: implementation of [`LogSink`] that will receive the lines.
/// - `config`: [`LayerConfig`] controlling buffering and batching.
///
/// **Returns**
/// - the handle of the background task that feeds the sink.
/// - `Err(InitError)` if a global subscriber was already installed.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    encoder: JsonLogEncoder,
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let (layer, handle) = JsonLogLayer::new(
        encoder,
        sink,
        config.channel_buffer,
        config.batch_size,
        config.flush_interval,
    );
    let layer = layer.with_min_level(config.min_level);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(handle)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`]. This is the recommended entrypoint for
/// typical microservices.
pub fn init_tracing(
    encoder: JsonLogEncoder,
    sink: Arc<dyn LogSink>,
) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(encoder, sink, LayerConfig::default())
}
