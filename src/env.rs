//! Environment variable names used by this crate for convenient
//! configuration of destinations from services.
//!
//! These are purely helpers; the core types remain decoupled from
//! environment access.

#[cfg(feature = "http")]
use crate::destination::{self, Destination, DestinationError};

/// Webhook URL. Takes precedence over the bot settings.
pub const DISCORD_SINK_WEBHOOK_URL_ENV: &str = "DISCORD_SINK_WEBHOOK_URL";

/// Username forced onto webhook messages.
pub const DISCORD_SINK_USERNAME_ENV: &str = "DISCORD_SINK_USERNAME";

/// Avatar URL forced onto webhook messages.
pub const DISCORD_SINK_AVATAR_URL_ENV: &str = "DISCORD_SINK_AVATAR_URL";

/// Bot token used for channel and DM destinations.
pub const DISCORD_SINK_BOT_TOKEN_ENV: &str = "DISCORD_SINK_BOT_TOKEN";

/// Channel the bot posts to.
pub const DISCORD_SINK_CHANNEL_ID_ENV: &str = "DISCORD_SINK_CHANNEL_ID";

/// User the bot sends direct messages to, when no channel is set.
pub const DISCORD_SINK_USER_ID_ENV: &str = "DISCORD_SINK_USER_ID";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(feature = "http")]
fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(feature = "http")]
fn parse_id(name: &'static str, value: String) -> Result<u64, DestinationError> {
    value
        .trim()
        .parse()
        .map_err(|_| DestinationError::InvalidId { name, value })
}

/// Pick a destination from the environment: a webhook if
/// [`DISCORD_SINK_WEBHOOK_URL_ENV`] is set, otherwise a bot channel, otherwise
/// a bot DM.
#[cfg(feature = "http")]
pub async fn destination_from_env() -> Result<Destination, DestinationError> {
    if let Some(url) = non_empty(DISCORD_SINK_WEBHOOK_URL_ENV) {
        let username = non_empty(DISCORD_SINK_USERNAME_ENV);
        let avatar_url = non_empty(DISCORD_SINK_AVATAR_URL_ENV);
        return Ok(destination::webhook_as(url, username.as_deref(), avatar_url.as_deref()));
    }

    let token = non_empty(DISCORD_SINK_BOT_TOKEN_ENV).ok_or(DestinationError::NotConfigured)?;
    if let Some(channel_id) = non_empty(DISCORD_SINK_CHANNEL_ID_ENV) {
        let channel_id = parse_id(DISCORD_SINK_CHANNEL_ID_ENV, channel_id)?;
        return Ok(destination::channel(&token, channel_id));
    }
    if let Some(user_id) = non_empty(DISCORD_SINK_USER_ID_ENV) {
        let user_id = parse_id(DISCORD_SINK_USER_ID_ENV, user_id)?;
        return destination::direct_message(&token, user_id).await;
    }
    Err(DestinationError::NotConfigured)
}
