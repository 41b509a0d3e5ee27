use serde_json::{Map, Value};

use crate::binding::BindingError;
use crate::chunks::{char_len, chunk};
use crate::embed::{Embed, CONTENT_LIMIT};
use crate::record::LogEvent;

/// Body of one request to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `{"content": ...}`
    Content(String),
    /// `{"embeds": [...]}`
    Embeds(Vec<Embed>),
}

impl Payload {
    /// JSON object sent on the wire, before destination overrides and
    /// field filtering.
    pub fn to_body(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut body = Map::new();
        match self {
            Payload::Content(content) => {
                body.insert("content".to_string(), Value::String(content.clone()));
            }
            Payload::Embeds(embeds) => {
                body.insert("embeds".to_string(), serde_json::to_value(embeds)?);
            }
        }
        Ok(body)
    }
}

/// Renders a [`LogEvent`] as a single line of text.
pub type FormatFn = dyn Fn(&LogEvent) -> String + Send + Sync;

/// `<timestamp> - <target> - <LEVEL> - <message>`
pub fn default_format(event: &LogEvent) -> String {
    format!(
        "{} - {} - {} - {}",
        event.timestamp.to_rfc3339(),
        event.target,
        event.level,
        event.message
    )
}

/// Turns one [`LogEvent`] into the ordered payloads to deliver for it.
///
/// Implementations must keep every payload within the destination's size
/// limits, splitting the event over several payloads when needed.
pub trait MessageCreator: Send + Sync {
    /// `format` renders the event as text. Creators that lay the event out
    /// themselves may ignore it.
    fn messages(&self, event: &LogEvent, format: &FormatFn) -> Result<Vec<Payload>, BindingError>;
}

/// Returned by [`BasicMessageCreator::with_decoration`] when prefix and
/// suffix alone fill a message.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("decoration of {0} chars leaves no room within the 2000 char content limit")]
pub struct DecorationTooLong(pub usize);

/// Sends the formatted line as plain `content`, optionally wrapped in a
/// code fence, split over as many messages as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicMessageCreator {
    prefix: String,
    suffix: String,
}

impl BasicMessageCreator {
    /// `monospace` wraps every message in a ```` ``` ```` fence.
    pub fn new(monospace: bool) -> Self {
        let fence = if monospace { "```" } else { "" };
        BasicMessageCreator {
            prefix: fence.to_string(),
            suffix: fence.to_string(),
        }
    }

    /// Wrap every message in `prefix` and `suffix`.
    ///
    /// Fails unless the decoration leaves room for at least one char of
    /// the formatted line within [`CONTENT_LIMIT`].
    pub fn with_decoration(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Result<Self, DecorationTooLong> {
        let prefix = prefix.into();
        let suffix = suffix.into();
        let len = char_len(&prefix) + char_len(&suffix);
        if len >= CONTENT_LIMIT {
            return Err(DecorationTooLong(len));
        }
        Ok(BasicMessageCreator { prefix, suffix })
    }

    /// Chars of the formatted line that fit in one message.
    pub fn content_limit(&self) -> usize {
        CONTENT_LIMIT - char_len(&self.prefix) - char_len(&self.suffix)
    }

    fn decorate(&self, text: &str) -> Payload {
        Payload::Content(format!("{}{}{}", self.prefix, text, self.suffix))
    }
}

impl Default for BasicMessageCreator {
    fn default() -> Self {
        BasicMessageCreator::new(true)
    }
}

impl MessageCreator for BasicMessageCreator {
    fn messages(&self, event: &LogEvent, format: &FormatFn) -> Result<Vec<Payload>, BindingError> {
        let text = format(event);
        let mut payloads: Vec<Payload> = chunk(&text, self.content_limit())
            .map(|piece| self.decorate(piece))
            .collect();
        if payloads.is_empty() {
            payloads.push(self.decorate(""));
        }
        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Severity;

    fn message_only(event: &LogEvent) -> String {
        event.message.clone()
    }

    fn contents(payloads: &[Payload]) -> Vec<&str> {
        payloads
            .iter()
            .map(|p| match p {
                Payload::Content(c) => c.as_str(),
                Payload::Embeds(_) => panic!("expected content payload"),
            })
            .collect()
    }

    #[test]
    fn long_monospace_message_is_split() {
        let message = "m".repeat(3000);
        let event = LogEvent::new(Severity::Info, message.clone());
        let payloads = BasicMessageCreator::default().messages(&event, &message_only).unwrap();

        let contents = contents(&payloads);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].len(), 2000);
        assert_eq!(&contents[0][3..1997], &message[..1994]);
        assert_eq!(contents[1], format!("```{}```", &message[1994..]));
    }

    #[test]
    fn plain_messages_use_the_whole_limit() {
        let creator = BasicMessageCreator::new(false);
        assert_eq!(creator.content_limit(), 2000);

        let event = LogEvent::new(Severity::Info, "x".repeat(4001));
        let payloads = creator.messages(&event, &message_only).unwrap();
        let lens: Vec<usize> = contents(&payloads).iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![2000, 2000, 1]);
    }

    #[test]
    fn custom_decoration_stays_within_content_limit() {
        let creator =
            BasicMessageCreator::with_decoration(">".repeat(1000), "<".repeat(999)).unwrap();
        assert_eq!(creator.content_limit(), 1);

        let event = LogEvent::new(Severity::Info, "hello");
        let payloads = creator.messages(&event, &message_only).unwrap();
        let contents = contents(&payloads);
        assert_eq!(contents.len(), 5);
        assert!(contents.iter().all(|c| c.chars().count() == CONTENT_LIMIT));
    }

    #[test]
    fn decoration_filling_a_message_is_rejected() {
        assert_eq!(
            BasicMessageCreator::with_decoration("<".repeat(1000), ">".repeat(1000)),
            Err(DecorationTooLong(2000))
        );
        assert!(BasicMessageCreator::with_decoration("", "x".repeat(2500)).is_err());
    }

    #[test]
    fn empty_line_still_sends_one_message() {
        let event = LogEvent::new(Severity::Info, "");
        let payloads = BasicMessageCreator::default().messages(&event, &message_only).unwrap();
        assert_eq!(contents(&payloads), vec!["``````"]);
    }

    #[test]
    fn default_format_includes_level_and_message() {
        let event = LogEvent::new(Severity::Warn, "disk almost full").with_target("app::disk");
        let line = default_format(&event);
        assert!(line.ends_with(" - app::disk - WARN - disk almost full"));
    }

    #[test]
    fn body_shapes() {
        let body = Payload::Content("hi".to_string()).to_body().unwrap();
        assert_eq!(Value::Object(body), serde_json::json!({ "content": "hi" }));

        let body = Payload::Embeds(vec![Embed::default()]).to_body().unwrap();
        assert_eq!(Value::Object(body), serde_json::json!({ "embeds": [{}] }));
    }
}
