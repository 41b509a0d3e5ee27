use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

use tracing_discord_sink::destination::webhook_as;
use tracing_discord_sink::embed_creator::{EmbedFieldDef, EmbedMessageCreator};
use tracing_discord_sink::init::{init_tracing_with_handler, LayerConfig};
use tracing_discord_sink::queue::RetryPolicy;
use tracing_discord_sink::transport::NoopTransport;
use tracing_discord_sink::{DiscordHandler, Severity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LayerConfig {
        level: Severity::Error,
        retry: RetryPolicy {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Some(Duration::from_secs(5)),
            max_retries: Some(8),
        },
        enable_stdout: false,
        ..LayerConfig::default()
    };

    let creator = EmbedMessageCreator::builder()
        .field(EmbedFieldDef::new(|_| "Iteration".to_string(), |e| {
            e.fields.get("iteration").map(|v| v.to_string()).unwrap_or_default()
        }))
        .build()?;

    let handler = DiscordHandler::builder(webhook_as(
        "https://discord.invalid/api/webhooks/0/load",
        Some("load-test"),
        None,
    ))
    .transport(Arc::new(NoopTransport))
    .message_creator(creator)
    .level(config.level)
    .retry(config.retry)
    .build()?;
    let handler = Arc::new(handler);
    init_tracing_with_handler(Arc::clone(&handler), config.enable_stdout)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(
            iteration = i,
            "custom load test error with a message long enough to make embeds do some work"
        );
    }

    let queued = start.elapsed();
    handler.flush().await?;
    println!(
        "embed messages: queued {} events in {:?} (~{:.0} ev/s), delivered {}",
        n,
        queued,
        n as f64 / queued.as_secs_f64(),
        handler.queue().delivered.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}
