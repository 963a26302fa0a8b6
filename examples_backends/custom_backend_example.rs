use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_json_encoder::{
    init::init_tracing,
    sink::LogSink,
    JsonLogEncoder,
};

/// Example of integrating a completely custom backend by implementing
/// the `LogSink` trait directly. Imagine this talks to some
/// proprietary log store for which this crate does not provide a built-in
/// sink.
struct MyCustomStoreSink;

#[async_trait]
impl LogSink for MyCustomStoreSink {
    async fn send(&self, line: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Here you would call your own client library for the target store.
        // For the sake of example we just print the line.
        print!("[my-custom-store] {}", String::from_utf8_lossy(line));
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomStoreSink);

    let encoder = JsonLogEncoder::builder()
        .static_field("backend:my-custom-store")
        .mapper(|json, event| {
            json.append("messageLength", &event.formatted_message.len());
        })
        .build();

    init_tracing(encoder, sink).expect("install subscriber");

    info!("custom backend example started");
    error!(store = "my-custom-store", "simulated error sent via custom backend");

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
}
