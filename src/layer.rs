use crate::handler::DiscordHandler;
use crate::record::{ExceptionInfo, LogEvent, Severity};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets whose events are never forwarded: this crate's own delivery
/// logging and the HTTP stack it uses, which would otherwise feed back
/// into delivery.
const INTERNAL_TARGETS: &[&str] = &[env!("CARGO_CRATE_NAME"), "hyper", "reqwest", "h2", "rustls"];

/// `tracing_subscriber` layer that turns events into [`LogEvent`]s and
/// hands them to a [`DiscordHandler`].
///
/// Building and queueing messages happens on the calling thread; network
/// I/O happens on the handler's background task. Failures never reach the
/// application: they are counted here, or recorded by the handler's queue.
pub struct DiscordLayer {
    handler: Arc<DiscordHandler>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events turned into queued messages.
    pub emitted_events: Arc<AtomicU64>,
    /// Events that could not be turned into messages or queued.
    pub failed_events: Arc<AtomicU64>,
}

impl DiscordLayer {
    pub fn new(handler: Arc<DiscordHandler>) -> Self {
        Self {
            handler,
            total_events: Arc::new(AtomicU64::new(0)),
            emitted_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn handler(&self) -> &Arc<DiscordHandler> {
        &self.handler
    }
}

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS
        .iter()
        .any(|t| target == *t || target.strip_prefix(t).is_some_and(|rest| rest.starts_with("::")))
}

impl<S> Layer<S> for DiscordLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        let level = Severity::from(meta.level());
        if !self.handler.enabled(level) || is_internal(meta.target()) {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut exception: Option<ExceptionInfo> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
            exception: &mut exception,
        };
        event.record(&mut visitor);

        let record = LogEvent {
            timestamp: Utc::now(),
            level,
            target: meta.target().to_string(),
            module_path: meta.module_path().map(|s| s.to_string()),
            file: meta.file().map(|s| s.to_string()),
            line: meta.line(),
            fields,
            message: message.unwrap_or_default(),
            exception,
        };

        match self.handler.emit(&record) {
            Ok(()) => {
                self.emitted_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "dropping log event");
            }
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
    pub exception: &'a mut Option<ExceptionInfo>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            let value = serde_json::Value::String(value.to_string());
            self.fields.insert(field.name().to_string(), value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        *self.exception = Some(ExceptionInfo::from_error(field.name(), value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            let value = serde_json::Value::String(format!("{:?}", value));
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::webhook;
    use crate::embed_creator::EmbedMessageCreator;
    use crate::queue::tests::ScriptedTransport;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Debug)]
    struct BadInput;

    impl std::fmt::Display for BadInput {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("bad input")
        }
    }

    impl std::error::Error for BadInput {}

    #[test]
    fn internal_targets_are_recognised() {
        assert!(is_internal("hyper"));
        assert!(is_internal("hyper::proto::h1"));
        assert!(is_internal(concat!(env!("CARGO_CRATE_NAME"), "::queue")));
        assert!(!is_internal("hyperion"));
        assert!(!is_internal("my_app"));
    }

    #[tokio::test]
    async fn tracing_events_reach_the_destination() {
        let transport = ScriptedTransport::accepting();
        let handler = DiscordHandler::builder(webhook("https://discord.test/hook"))
            .transport(transport.clone())
            .message_creator(EmbedMessageCreator::builder().build().unwrap())
            .level(Severity::Warn)
            .build()
            .unwrap();
        let handler = Arc::new(handler);
        let layer = DiscordLayer::new(Arc::clone(&handler));
        let total = Arc::clone(&layer.total_events);
        let emitted = Arc::clone(&layer.emitted_events);

        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("not sent");
            let err = BadInput;
            let error = &err as &(dyn std::error::Error + 'static);
            tracing::error!(user_id = 42, error, "request failed");
        });
        handler.flush().await.unwrap();

        assert!(total.load(Ordering::Relaxed) >= 2);
        assert_eq!(emitted.load(Ordering::Relaxed), 1);
        let bodies = transport.bodies();
        assert_eq!(bodies.len(), 1);
        let embed = &bodies[0]["embeds"][0];
        assert_eq!(embed["title"], "request failed");
        assert_eq!(embed["author"]["name"], "ERROR");
        assert_eq!(embed["fields"][0]["name"], "error: bad input");
        assert_eq!(embed["fields"][0]["value"], "-");
    }
}
