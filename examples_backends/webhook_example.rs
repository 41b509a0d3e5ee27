use tracing::{error, info, warn};
use tracing_discord_sink::destination::webhook_as;
use tracing_discord_sink::env::{destination_from_env, env_or, DISCORD_SINK_WEBHOOK_URL_ENV};
use tracing_discord_sink::init::{init_tracing, init_tracing_with_config, LayerConfig, MessageStyle};
use tracing_discord_sink::Severity;

/// Posts a few events to a real Discord destination.
///
/// Reads the destination from the `DISCORD_SINK_*` variables; without them
/// it falls back to a webhook URL that will simply fail delivery.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handler = match destination_from_env().await {
        Ok(destination) => init_tracing(destination)?,
        Err(e) => {
            eprintln!("{}; using a placeholder webhook", e);
            let fallback = "https://discord.invalid/api/webhooks/0/example";
            let url = env_or(DISCORD_SINK_WEBHOOK_URL_ENV, fallback);
            let config = LayerConfig {
                level: Severity::Info,
                style: MessageStyle::EmbedLongMessage,
                ..LayerConfig::default()
            };
            init_tracing_with_config(webhook_as(url, Some("webhook-example"), None), config)?
        }
    };

    info!("webhook example started");
    warn!(attempt = 3, "slow upstream");
    let failure = std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "upstream refused connection",
    );
    error!(error = &failure as &(dyn std::error::Error + 'static), "request failed");

    if let Err(e) = handler.flush().await {
        eprintln!("delivery failed: {}", e);
    }
    Ok(())
}
