use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for encoded log lines.
///
/// Every line handed to a sink is one complete JSON document including its
/// trailing line separator, as produced by
/// [`JsonLogEncoder::encode`](crate::encoder::JsonLogEncoder::encode).
/// Implementations transport lines to a concrete backend (stdout, a file, a
/// log shipper). The layer calls `send` from a background task and never
/// awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single encoded line to the underlying backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted by the backend.
    /// - `Err(..)` if the backend failed. The layer treats this as a
    ///   transient failure and retries the rest of the batch with backoff.
    async fn send(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered lines, if the backend implements buffering.
    ///
    /// Called by the layer after every batch. Default implementation is a
    /// no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
