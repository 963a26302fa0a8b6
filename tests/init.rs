#![cfg(feature = "layer")]

use std::sync::Arc;
use tracing_json_encoder::init::{init_tracing, init_tracing_with_config, InitError, LayerConfig};
use tracing_json_encoder::noop_sink::NoopSink;
use tracing_json_encoder::JsonLogEncoder;

#[tokio::test]
async fn global_subscriber_is_installed_once() {
    let config = LayerConfig {
        enable_stdout: true,
        ..LayerConfig::default()
    };
    init_tracing_with_config(JsonLogEncoder::default(), Arc::new(NoopSink), config)
        .expect("first installation succeeds");

    tracing::info!("goes to the noop sink");

    let second = init_tracing(JsonLogEncoder::default(), Arc::new(NoopSink));
    assert!(matches!(second, Err(InitError::SetGlobalDefault(_))));
}
