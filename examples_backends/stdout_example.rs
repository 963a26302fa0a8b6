use std::sync::Arc;
use tracing::{error, info, info_span};

use tracing_json_encoder::encoder::EncoderBuilder;
use tracing_json_encoder::init::{init_tracing_with_config, LayerConfig};
use tracing_json_encoder::stdout_sink::StdoutSink;

/// One JSON document per line on stdout, the format container log drivers
/// such as awslogs pick up. Toggles and static fields come from `LOG_JSON_*`
/// environment variables, e.g.
///
/// ```text
/// LOG_JSON_INCLUDE_CALLER=true LOG_JSON_STATIC_FIELDS=service:auth,env:dev \
///     cargo run --example stdout_example
/// ```
#[tokio::main]
async fn main() {
    let encoder = EncoderBuilder::from_env().build();
    let handle = init_tracing_with_config(
        encoder,
        Arc::new(StdoutSink::new()),
        LayerConfig {
            enable_stdout: true,
            ..LayerConfig::default()
        },
    )
    .expect("install subscriber");

    let span = info_span!("request", request_id = "4f1c");
    {
        let _guard = span.enter();
        info!(path = "/login", "request received");

        let err = "x".parse::<u16>().unwrap_err();
        error!(error = &err as &(dyn std::error::Error + 'static), "could not parse port");
    }

    // Keep the process alive until the background task has flushed.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), handle).await;
}
