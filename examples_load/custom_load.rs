use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{error, info_span, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use tracing_json_encoder::layer::JsonLogLayer;
use tracing_json_encoder::noop_sink::NoopSink;
use tracing_json_encoder::{EncoderConfig, JsonLogEncoder};

/// Load test with every field enabled and the layer counters printed at
/// the end, to see how many lines a small channel drops under pressure.
#[tokio::main]
async fn main() {
    let encoder = JsonLogEncoder::builder()
        .config(EncoderConfig {
            include_nanoseconds: true,
            include_sequence_number: true,
            include_caller: true,
            include_root_cause: true,
            ..Default::default()
        })
        .static_field("service:load-test")
        .static_field("env:bench")
        .build();

    let (layer, _handle) = JsonLogLayer::new(
        encoder,
        Arc::new(NoopSink),
        50_000,
        1_000,
        Duration::from_millis(200),
    );
    let layer = layer.with_min_level(Level::WARN);
    let enqueued = Arc::clone(&layer.enqueued_events);
    let dropped = Arc::clone(&layer.dropped_events);

    tracing::subscriber::set_global_default(Registry::default().with(layer))
        .expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    let span = info_span!("worker", worker_id = 7, region = "eu-central-1");
    let _guard = span.enter();
    for i in 0..n {
        error!(iteration = i, marker = "LOAD", "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: encoded {} events in {:?} (~{:.0} ev/s), enqueued {}, dropped {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        enqueued.load(Ordering::Relaxed),
        dropped.load(Ordering::Relaxed),
    );

    sleep(Duration::from_secs(2)).await;
}
