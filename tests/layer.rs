#![cfg(feature = "layer")]

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use tracing_json_encoder::layer::JsonLogLayer;
use tracing_json_encoder::sink::LogSink;
use tracing_json_encoder::{EncoderConfig, JsonLogEncoder};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Keeps every line in memory. Optionally fails the very first send.
#[derive(Clone, Default)]
struct CaptureSink {
    lines: Arc<Mutex<Vec<String>>>,
    fail_first: Arc<AtomicBool>,
}

impl CaptureSink {
    fn failing_once() -> Self {
        let sink = CaptureSink::default();
        sink.fail_first.store(true, Ordering::SeqCst);
        sink
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("sink lock").clone()
    }

    async fn wait_for(&self, count: usize) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let lines = self.lines();
            if lines.len() >= count {
                return lines
                    .iter()
                    .map(|line| serde_json::from_str(line).expect("valid json line"))
                    .collect();
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} lines, got {}",
                lines.len()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl LogSink for CaptureSink {
    async fn send(&self, line: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.fail_first.swap(false, Ordering::SeqCst) {
            return Err("backend unavailable".into());
        }
        let line = String::from_utf8(line.to_vec())?;
        assert!(line.ends_with('\n'));
        self.lines.lock().expect("sink lock").push(line);
        Ok(())
    }
}

fn encoder() -> JsonLogEncoder {
    JsonLogEncoder::builder()
        .config(EncoderConfig {
            include_sequence_number: true,
            include_caller: true,
            include_root_cause: true,
            ..Default::default()
        })
        .static_field("service:auth")
        .build()
}

#[tokio::test]
async fn events_become_json_lines() {
    let sink = CaptureSink::default();
    let (layer, _handle) = JsonLogLayer::new(
        encoder(),
        Arc::new(sink.clone()),
        64,
        1,
        Duration::from_millis(10),
    );
    let subscriber = Registry::default().with(layer.with_min_level(Level::INFO));

    tracing::subscriber::with_default(subscriber, || {
        let span = tracing::info_span!("request", request_id = "abc-123");
        let _guard = span.enter();

        tracing::debug!("filtered out by level");
        tracing::error!(user_id = 42u64, marker = "AUDIT, SECURITY", "authentication failed");

        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        tracing::warn!(error = &err as &(dyn Error + 'static), "write failed");
    });

    let lines = sink.wait_for(2).await;
    assert_eq!(lines.len(), 2);

    let first = &lines[0];
    assert!(first["timestamp"].is_i64());
    assert_eq!(first["sequenceNumber"], 0);
    assert_eq!(first["level"], "ERROR");
    assert_eq!(first["message"], "authentication failed");
    assert!(first["logger"].is_string());
    assert_eq!(first["mdc"]["request_id"], "abc-123");
    assert_eq!(first["keyValues"]["user_id"], 42);
    assert_eq!(first["markers"]["AUDIT"], 1);
    assert_eq!(first["markers"]["SECURITY"], 1);
    assert!(first["caller"]["line"].is_u64());
    assert_eq!(first["staticFields"]["service"], "auth");
    assert!(first.get("stacktrace").is_none());
    assert!(first.get("rootCause").is_none());

    let second = &lines[1];
    assert_eq!(second["sequenceNumber"], 1);
    assert_eq!(second["level"], "WARN");
    assert_eq!(second["message"], "write failed");
    assert_eq!(second["rootCause"]["message"], "disk gone");
    assert!(second["stacktrace"]
        .as_str()
        .expect("stacktrace string")
        .contains("disk gone"));
    assert!(second.get("keyValues").is_none());
}

#[tokio::test]
async fn inner_span_fields_override_outer() {
    let sink = CaptureSink::default();
    let (layer, _handle) = JsonLogLayer::new(
        JsonLogEncoder::default(),
        Arc::new(sink.clone()),
        64,
        1,
        Duration::from_millis(10),
    );
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        let outer = tracing::info_span!("outer", tenant = "acme", stage = "outer");
        let _outer = outer.enter();
        let inner = tracing::info_span!("inner", stage = tracing::field::Empty);
        inner.record("stage", "inner");
        let _inner = inner.enter();
        tracing::info!("nested");
    });

    let lines = sink.wait_for(1).await;
    assert_eq!(lines[0]["mdc"], serde_json::json!({"stage": "inner", "tenant": "acme"}));
}

#[tokio::test]
async fn full_channel_drops_lines() {
    let sink = CaptureSink::default();
    let (layer, _handle) = JsonLogLayer::new(
        JsonLogEncoder::default(),
        Arc::new(sink.clone()),
        16,
        1_000,
        Duration::from_millis(10),
    );
    let total = Arc::clone(&layer.total_events);
    let enqueued = Arc::clone(&layer.enqueued_events);
    let dropped = Arc::clone(&layer.dropped_events);

    // The background task cannot run until this test yields, so the
    // channel fills up deterministically.
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        for i in 0..40 {
            tracing::info!(iteration = i, "burst");
        }
    });

    assert_eq!(total.load(Ordering::Relaxed), 40);
    assert_eq!(enqueued.load(Ordering::Relaxed), 16);
    assert_eq!(dropped.load(Ordering::Relaxed), 24);

    let lines = sink.wait_for(16).await;
    assert_eq!(lines[0]["keyValues"]["iteration"], 0);
    assert_eq!(lines[15]["keyValues"]["iteration"], 15);
}

#[tokio::test]
async fn failed_send_is_retried() {
    let sink = CaptureSink::failing_once();
    let (layer, _handle) = JsonLogLayer::new(
        JsonLogEncoder::default(),
        Arc::new(sink.clone()),
        64,
        1,
        Duration::from_millis(10),
    );

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::error!("eventually delivered");
    });

    let lines = sink.wait_for(1).await;
    assert_eq!(lines[0]["message"], "eventually delivered");
}

#[tokio::test]
async fn background_task_ends_when_layer_is_dropped() {
    let sink = CaptureSink::default();
    let (layer, handle) = JsonLogLayer::new(
        JsonLogEncoder::default(),
        Arc::new(sink.clone()),
        64,
        1_000,
        Duration::from_secs(60),
    );

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::info!("flushed on shutdown");
    });

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("background task finished")
        .expect("background task did not panic");
    assert_eq!(sink.lines().len(), 1);
}
