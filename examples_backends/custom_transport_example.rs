use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_discord_sink::{
    destination::webhook,
    embed_creator::EmbedMessageCreator,
    init::init_tracing_with_handler,
    transport::{Transport, TransportError, TransportResponse},
    DiscordHandler, Severity,
};

/// Example of delivering through your own HTTP stack by implementing
/// [`Transport`] directly. This one prints each message instead of
/// posting it.
struct StdoutTransport;

#[async_trait]
impl Transport for StdoutTransport {
    async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        println!("[{}] {}", url, serde_json::to_string_pretty(body)?);
        Ok(TransportResponse::new(204, ""))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handler = DiscordHandler::builder(webhook("https://discord.invalid/api/webhooks/0/custom"))
        .transport(Arc::new(StdoutTransport))
        .message_creator(EmbedMessageCreator::builder().build()?)
        .level(Severity::Info)
        .build()?;
    let handler = Arc::new(handler);
    init_tracing_with_handler(Arc::clone(&handler), true)?;

    info!("custom transport example started");
    error!(db = "orders", "{}", "x".repeat(600));

    handler.flush().await?;
    Ok(())
}
