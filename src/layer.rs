use crate::encoder::JsonLogEncoder;
use crate::record::{FieldValue, KeyValuePair, LogEvent, StackFrame, ThrowableProxy};
use crate::sink::LogSink;
use chrono::Utc;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

const MAX_SEND_ATTEMPTS: u32 = 5;

/// `tracing_subscriber` layer that encodes events into JSON lines and
/// forwards them to an asynchronous [`LogSink`] via a bounded channel and
/// background task.
///
/// Encoding happens on the thread that emitted the event; network or disk
/// I/O is fully decoupled from application threads. Fields of the entered
/// spans become the event's `mdc`, the remaining event fields its
/// `keyValues`.
pub struct JsonLogLayer {
    encoder: JsonLogEncoder,
    min_level: Level,
    sender: mpsc::Sender<Vec<u8>>,
    sequence: AtomicU64,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full or the background task is gone.
    pub dropped_events: Arc<AtomicU64>,
}

impl JsonLogLayer {
    /// Create a new layer and spawn a background task that pulls encoded
    /// lines from a bounded channel and sends them to the provided
    /// [`LogSink`]. Must be called from within a Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations. The task ends
    /// once the layer is dropped and the remaining lines are flushed.
    pub fn new(
        encoder: JsonLogEncoder,
        sink: Arc<dyn LogSink>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(buffer);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(line) => {
                            batch.push(line);
                            if batch.len() >= batch_size {
                                send_batch(&*sink, &mut batch).await;
                            }
                        }
                        None => {
                            send_batch(&*sink, &mut batch).await;
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            send_batch(&*sink, &mut batch).await;
                        }
                    }
                }
            }
        });

        (Self {
            encoder,
            min_level: Level::TRACE,
            sender: tx,
            sequence: AtomicU64::new(0),
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
        }, handle)
    }

    /// Ignore events more verbose than `level`.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    fn build_event<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> LogEvent
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut mdc = BTreeMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    mdc.extend(fields.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let meta = event.metadata();
        let now = Utc::now();
        LogEvent {
            timestamp: now.timestamp_millis(),
            nanos: Some(now.timestamp_subsec_nanos()),
            sequence_number: self.sequence.fetch_add(1, Ordering::Relaxed),
            level: meta.level().to_string(),
            thread_name: std::thread::current().name().map(str::to_string),
            logger_name: meta.target().to_string(),
            formatted_message: visitor.message.unwrap_or_default(),
            message: visitor.template,
            markers: visitor.markers,
            mdc,
            key_values: visitor.key_values,
            caller_data: vec![StackFrame::new(
                meta.module_path().unwrap_or_else(|| meta.target()),
                meta.name(),
                meta.file(),
                meta.line(),
            )],
            throwable: visitor.throwable,
        }
    }
}

/// Send the whole batch, retrying the unsent tail with exponential backoff.
/// After [`MAX_SEND_ATTEMPTS`] the rest of the batch is discarded.
async fn send_batch(sink: &dyn LogSink, batch: &mut Vec<Vec<u8>>) {
    let mut backoff = Duration::from_millis(100);
    let max_backoff = Duration::from_secs(10);
    let mut sent = 0;

    for attempt in 1..=MAX_SEND_ATTEMPTS {
        let mut failure: Option<Box<dyn Error + Send + Sync>> = None;
        for line in &batch[sent..] {
            if let Err(e) = sink.send(line).await {
                failure = Some(e);
                break;
            }
            sent += 1;
        }

        match failure {
            None => {
                if let Err(e) = sink.flush().await {
                    eprintln!("log sink flush failed: {}", e);
                }
                batch.clear();
                return;
            }
            Some(e) if attempt < MAX_SEND_ATTEMPTS => {
                eprintln!("log sink send failed ({}), retrying in {:?}", e, backoff);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
            }
            Some(e) => {
                eprintln!(
                    "log sink send failed ({}), dropping {} line(s)",
                    e,
                    batch.len() - sent
                );
            }
        }
    }
    batch.clear();
}

impl<S> Layer<S> for JsonLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            values.record(fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if *event.metadata().level() > self.min_level {
            return;
        }

        let record = self.build_event(event, &ctx);
        let line = self.encoder.encode(&record);

        match self.sender.try_send(line) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full or closed, dropping log line");
            }
        }
    }
}

/// Span fields, stored in the span's extensions.
#[derive(Default)]
struct SpanFields(BTreeMap<String, Option<String>>);

impl Visit for SpanFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), Some(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), Some(format!("{:?}", value)));
    }
}

/// Collects the parts of a `tracing` event that map onto [`LogEvent`].
///
/// `message` is the formatted message, `message_template` the raw message,
/// `marker`/`markers` a comma separated marker list and the first error
/// value the exception chain. Everything else becomes a key/value pair.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    template: Option<String>,
    markers: Vec<String>,
    key_values: Vec<KeyValuePair>,
    throwable: Option<ThrowableProxy>,
}

impl EventVisitor {
    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "message_template" => self.template = Some(value),
            "marker" | "markers" => self.markers.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
            ),
            name => self.push(name, FieldValue::Str(value)),
        }
    }

    fn push(&mut self, name: &str, value: FieldValue) {
        self.key_values.push(KeyValuePair {
            key: Some(name.to_string()),
            value: Some(value),
        });
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field.name(), FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field.name(), FieldValue::U64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field.name(), FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field.name(), FieldValue::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.throwable.is_none() {
            self.throwable = Some(ThrowableProxy::from_error(value));
        } else {
            self.push(field.name(), FieldValue::Str(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}
