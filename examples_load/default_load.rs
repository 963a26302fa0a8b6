use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{error, info_span};

use tracing_json_encoder::init::init_tracing;
use tracing_json_encoder::noop_sink::NoopSink;
use tracing_json_encoder::{JsonLogEncoder, KeyValuePair, LogEvent, TimestampFormat};

fn report(label: &str, n: u64, elapsed: Duration) {
    println!(
        "{label}: {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}

/// Measures the bare encoder first, then the same volume through the
/// global `tracing` subscriber with a pattern timestamp and message template.
#[tokio::main]
async fn main() {
    let n: u64 = 100_000;

    let encoder = JsonLogEncoder::default();
    let mut event = LogEvent::new("ERROR", "default_load", "default load test error");
    event.thread_name = Some("main".to_string());
    event.mdc.insert("request_id".to_string(), Some("load-1".to_string()));

    let mut bytes = 0usize;
    let start = Instant::now();
    for i in 0..n {
        event.key_values = vec![KeyValuePair::new("iteration", i)];
        bytes += encoder.encode(&event).len();
    }
    report("encoder only", n, start.elapsed());
    println!("average line: {} bytes", bytes as u64 / n);

    let encoder = JsonLogEncoder::builder()
        .timestamp_format(TimestampFormat::Pattern("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()))
        .message_template("{level} {logger}: {message}")
        .build();
    init_tracing(encoder, Arc::new(NoopSink)).expect("install subscriber");

    let span = info_span!("load", request_id = "load-1");
    let _guard = span.enter();

    let start = Instant::now();
    for i in 0..n {
        error!(iteration = i, "default load test error");
    }
    report("tracing layer", n, start.elapsed());

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
}
