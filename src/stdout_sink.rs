use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

/// Writes encoded lines to the process' standard output.
///
/// This is the ingestion path of container log drivers (awslogs, fluentd,
/// journald): one JSON document per line on stdout.
pub struct StdoutSink {
    out: Mutex<Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for StdoutSink {
    async fn send(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut out = self.out.lock().await;
        out.write_all(line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.out.lock().await.flush().await?;
        Ok(())
    }
}
