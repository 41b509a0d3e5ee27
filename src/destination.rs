use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Base URL of the Discord REST API.
pub const DISCORD_API_BASE: &str = "https://discord.com/api";

/// Top-level keys a webhook message accepts.
pub const WEBHOOK_FIELDS: &[&str] = &[
    "content",
    "username",
    "avatar_url",
    "tts",
    "embeds",
    "allowed_mentions",
    "components",
    "files",
    "payload_json",
    "attachments",
];

/// Top-level keys a bot message to a channel accepts.
pub const CHANNEL_FIELDS: &[&str] = &[
    "content",
    "tts",
    "embeds",
    "embed",
    "allowed_mentions",
    "message_reference",
    "components",
    "sticker_ids",
    "files",
    "payload_json",
    "attachments",
];

/// Supported destination kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Webhook,
    Channel,
    DirectMessage,
}

/// Where and how messages are posted: URL, session headers, the keys the
/// URL accepts, and keys forced onto every message.
///
/// Build one with [`webhook`], [`channel`] or [`direct_message`].
#[derive(Debug, Clone)]
pub struct Destination {
    pub kind: DestinationKind,
    pub url: String,
    /// Sent with every request, e.g. `Authorization`.
    pub headers: Vec<(String, String)>,
    /// `None` accepts every key.
    pub allowed_fields: Option<BTreeSet<String>>,
    /// Written over whatever the message creator produced.
    pub overrides: Map<String, Value>,
}

impl Destination {
    pub fn new(kind: DestinationKind, url: impl Into<String>) -> Self {
        Destination {
            kind,
            url: url.into(),
            headers: Vec::new(),
            allowed_fields: None,
            overrides: Map::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_allowed_fields<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.allowed_fields = Some(fields.into_iter().map(str::to_string).collect());
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Apply the overrides, then drop every key this destination does not
    /// accept.
    pub fn prepare(&self, mut body: Map<String, Value>) -> Value {
        for (key, value) in &self.overrides {
            body.insert(key.clone(), value.clone());
        }
        if let Some(allowed) = &self.allowed_fields {
            body.retain(|key, _| allowed.contains(key));
        }
        Value::Object(body)
    }

    /// A `reqwest` transport carrying this destination's headers.
    #[cfg(feature = "http")]
    pub fn transport(&self) -> Result<crate::transport::ReqwestTransport, DestinationError> {
        crate::transport::ReqwestTransport::with_headers(
            self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
        .map_err(|e| DestinationError::Http(e.to_string()))
    }
}

/// A webhook URL. Messages keep whatever username and avatar the
/// webhook was created with.
pub fn webhook(url: impl Into<String>) -> Destination {
    Destination::new(DestinationKind::Webhook, url)
        .with_allowed_fields(WEBHOOK_FIELDS.iter().copied())
}

/// A webhook URL posting under the given username and avatar.
pub fn webhook_as(
    url: impl Into<String>,
    username: Option<&str>,
    avatar_url: Option<&str>,
) -> Destination {
    let mut destination = webhook(url);
    if let Some(username) = username.filter(|u| !u.is_empty()) {
        destination = destination.with_override("username", username);
    }
    if let Some(avatar_url) = avatar_url.filter(|a| !a.is_empty()) {
        destination = destination.with_override("avatar_url", avatar_url);
    }
    destination
}

/// A channel the bot with `bot_token` posts to.
pub fn channel(bot_token: &str, channel_id: u64) -> Destination {
    channel_at(DISCORD_API_BASE, bot_token, channel_id)
}

/// [`channel`] against another API base, e.g. a test server.
pub fn channel_at(api_base: &str, bot_token: &str, channel_id: u64) -> Destination {
    let url = format!("{}/channels/{}/messages", api_base.trim_end_matches('/'), channel_id);
    Destination::new(DestinationKind::Channel, url)
        .with_header("Authorization", format!("Bot {}", bot_token))
        .with_allowed_fields(CHANNEL_FIELDS.iter().copied())
}

/// Open a DM channel between the bot and `user_id` and post there.
///
/// Fails if Discord refuses to open the channel, e.g. because the user
/// shares no server with the bot.
#[cfg(feature = "http")]
pub async fn direct_message(
    bot_token: &str,
    user_id: u64,
) -> Result<Destination, DestinationError> {
    direct_message_at(DISCORD_API_BASE, bot_token, user_id).await
}

/// [`direct_message`] against another API base, e.g. a test server.
#[cfg(feature = "http")]
pub async fn direct_message_at(
    api_base: &str,
    bot_token: &str,
    user_id: u64,
) -> Result<Destination, DestinationError> {
    let api_base = api_base.trim_end_matches('/');
    let authorization = format!("Bot {}", bot_token);
    let headers = [("Authorization", authorization.as_str())];
    let transport = crate::transport::ReqwestTransport::with_headers(headers)
        .map_err(|e| DestinationError::Http(e.to_string()))?;

    let resp = transport
        .client()
        .post(format!("{}/users/@me/channels", api_base))
        .json(&serde_json::json!({ "recipient_id": user_id.to_string() }))
        .send()
        .await
        .map_err(|e| DestinationError::Http(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
        return Err(DestinationError::DirectMessage {
            user_id,
            status: status.as_u16(),
            body,
        });
    }

    let channel: Value = resp.json().await.map_err(|e| DestinationError::Http(e.to_string()))?;
    let channel_id = match &channel["id"] {
        Value::String(id) => id.parse::<u64>().ok(),
        Value::Number(id) => id.as_u64(),
        _ => None,
    }
    .ok_or(DestinationError::MissingChannelId)?;

    let mut destination = channel_at(api_base, bot_token, channel_id);
    destination.kind = DestinationKind::DirectMessage;
    Ok(destination)
}

/// Error type returned when setting up a destination.
#[derive(thiserror::Error, Debug)]
pub enum DestinationError {
    #[error("could not create DM channel with user {user_id} (status {status}): {body}")]
    DirectMessage { user_id: u64, status: u16, body: String },

    #[error("DM channel response did not contain a channel id")]
    MissingChannelId,

    #[error("http client error: {0}")]
    Http(String),

    #[error("no destination configured: set a webhook URL, or a bot token and a channel or user")]
    NotConfigured,

    #[error("invalid {name}: {value}")]
    InvalidId { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn webhook_overrides_username_and_avatar() {
        let dest = webhook_as("https://discord.test/hook", Some("lumberjack"), None);
        let prepared = dest.prepare(body(json!({ "content": "hi", "username": "creator" })));
        assert_eq!(prepared, json!({ "content": "hi", "username": "lumberjack" }));
    }

    #[test]
    fn unknown_keys_are_stripped() {
        let dest = channel("token", 42);
        let input = json!({ "content": "hi", "username": "x", "embeds": [] });
        let prepared = dest.prepare(body(input));
        assert_eq!(prepared, json!({ "content": "hi", "embeds": [] }));
    }

    #[test]
    fn channel_url_and_auth_header() {
        let dest = channel_at("https://discord.test/api/", "abc", 42);
        assert_eq!(dest.kind, DestinationKind::Channel);
        assert_eq!(dest.url, "https://discord.test/api/channels/42/messages");
        assert_eq!(dest.headers, vec![("Authorization".to_string(), "Bot abc".to_string())]);
    }

    #[test]
    fn destinations_without_allow_list_keep_everything() {
        let dest = Destination::new(DestinationKind::Webhook, "https://discord.test/hook");
        let prepared = dest.prepare(body(json!({ "anything": 1 })));
        assert_eq!(prepared, json!({ "anything": 1 }));
    }
}
