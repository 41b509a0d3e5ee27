use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_discord_sink::destination::webhook;
use tracing_discord_sink::init::init_tracing_with_handler;
use tracing_discord_sink::transport::NoopTransport;
use tracing_discord_sink::DiscordHandler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handler = DiscordHandler::builder(webhook("https://discord.invalid/api/webhooks/0/load"))
        .transport(Arc::new(NoopTransport))
        .build()?;
    let handler = Arc::new(handler);
    init_tracing_with_handler(Arc::clone(&handler), false)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let queued = start.elapsed();
    handler.flush().await?;
    let drained = start.elapsed();
    println!(
        "monospace messages: queued {} events in {:?} (~{:.0} ev/s), delivered after {:?}",
        n,
        queued,
        n as f64 / queued.as_secs_f64(),
        drained
    );
    Ok(())
}
