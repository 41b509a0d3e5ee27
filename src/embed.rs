use serde::Serialize;
use std::fmt;

use crate::chunks::char_len;

/// Max chars in a plain `content` message.
pub const CONTENT_LIMIT: usize = 2000;
/// Max chars across the size-limited slots of one embed.
pub const EMBED_TOTAL_LIMIT: usize = 6000;
pub const TITLE_LIMIT: usize = 256;
pub const DESCRIPTION_LIMIT: usize = 4096;
pub const FIELD_NAME_LIMIT: usize = 256;
pub const FIELD_VALUE_LIMIT: usize = 1024;
pub const AUTHOR_NAME_LIMIT: usize = 256;
pub const FOOTER_TEXT_LIMIT: usize = 2048;
/// Max embeds in one message.
pub const BATCH_EMBED_LIMIT: usize = 10;
/// Max chars across the size-limited slots of all embeds in one message.
pub const BATCH_TOTAL_LIMIT: usize = 6000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl EmbedAuthor {
    /// Discord rejects an author without a name, so such an author is
    /// not serialized at all.
    fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl EmbedFooter {
    fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: Option<String>,
}

impl EmbedImage {
    fn is_empty(&self) -> bool {
        self.url.is_none()
    }
}

/// One rich message unit. A message carries up to
/// [`BATCH_EMBED_LIMIT`] of these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "EmbedAuthor::is_empty")]
    pub author: EmbedAuthor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "EmbedFooter::is_empty")]
    pub footer: EmbedFooter,
    #[serde(skip_serializing_if = "EmbedImage::is_empty")]
    pub image: EmbedImage,
    #[serde(skip_serializing_if = "EmbedImage::is_empty")]
    pub thumbnail: EmbedImage,
}

impl Embed {
    /// An empty embed with `n_fields` blank named fields to be filled by
    /// index.
    pub fn with_fields(n_fields: usize) -> Self {
        Embed {
            fields: vec![EmbedField::default(); n_fields],
            ..Embed::default()
        }
    }

    /// Chars across the size-limited slots: title, description, footer
    /// text, author name and every field name and value.
    pub fn length(&self) -> usize {
        let opt = |s: &Option<String>| s.as_deref().map_or(0, char_len);
        opt(&self.title)
            + opt(&self.description)
            + opt(&self.footer.text)
            + char_len(&self.author.name)
            + self
                .fields
                .iter()
                .map(|f| char_len(&f.name) + char_len(&f.value))
                .sum::<usize>()
    }

    /// [`length`](Self::length) plus one char for every field that will
    /// get a `-` placeholder on its empty side.
    pub fn normalized_length(&self) -> usize {
        let placeholders = self
            .fields
            .iter()
            .filter(|f| f.name.is_empty() != f.value.is_empty())
            .count();
        self.length() + placeholders
    }

    /// Chars that may be written at `slot` without pushing
    /// [`normalized_length`](Self::normalized_length) past
    /// [`EMBED_TOTAL_LIMIT`]. `None` for slots that do not count toward it.
    pub fn room_for(&self, slot: Slot) -> Option<usize> {
        if !slot.counts_toward_total() {
            return None;
        }
        let existing = self.text(slot).map_or(0, char_len);
        let mut used = self.normalized_length() - existing;

        let sibling = match slot {
            Slot::FieldName(i) => self.fields.get(i).map(|f| (&f.name, &f.value)),
            Slot::FieldValue(i) => self.fields.get(i).map(|f| (&f.value, &f.name)),
            _ => None,
        };
        if let Some((this, other)) = sibling {
            // Placeholder cost now vs. after this side becomes non-empty.
            if this.is_empty() != other.is_empty() {
                used -= 1;
            }
            if other.is_empty() {
                used += 1;
            }
        }
        Some(EMBED_TOTAL_LIMIT.saturating_sub(used))
    }

    /// Drop fields with no name and no value; give fields with exactly one
    /// empty side a `-` there.
    pub fn fix_fields(&mut self) {
        self.fields.retain(|f| !(f.name.is_empty() && f.value.is_empty()));
        for field in &mut self.fields {
            if field.name.is_empty() {
                field.name = "-".to_string();
            }
            if field.value.is_empty() {
                field.value = "-".to_string();
            }
        }
    }

    /// Write `value` at `slot`, replacing what was there.
    pub fn set(&mut self, slot: Slot, value: FieldValue) -> Result<(), PathError> {
        match (slot, value) {
            (Slot::Color, FieldValue::Integer(v)) => {
                let colour =
                    u32::try_from(v).map_err(|_| PathError::OutOfRange { slot, value: v })?;
                self.color = Some(colour);
            }
            (Slot::FieldInline(i), FieldValue::Flag(v)) => self.field_mut(i)?.inline = v,
            (slot, FieldValue::Text(text)) if slot.is_text() => match slot {
                Slot::AuthorName => self.author.name = text,
                Slot::AuthorUrl => self.author.url = Some(text),
                Slot::AuthorIconUrl => self.author.icon_url = Some(text),
                Slot::Title => self.title = Some(text),
                Slot::Description => self.description = Some(text),
                Slot::Url => self.url = Some(text),
                Slot::Timestamp => self.timestamp = Some(text),
                Slot::FooterText => self.footer.text = Some(text),
                Slot::FooterIconUrl => self.footer.icon_url = Some(text),
                Slot::ImageUrl => self.image.url = Some(text),
                Slot::ThumbnailUrl => self.thumbnail.url = Some(text),
                Slot::FieldName(i) => self.field_mut(i)?.name = text,
                Slot::FieldValue(i) => self.field_mut(i)?.value = text,
                Slot::Color | Slot::FieldInline(_) => unreachable!("not a text slot"),
            },
            (slot, value) => {
                return Err(PathError::TypeMismatch {
                    slot,
                    found: value.kind(),
                })
            }
        }
        Ok(())
    }

    /// Current text at `slot`, if it is a text slot and is set.
    pub fn text(&self, slot: Slot) -> Option<&str> {
        let text = match slot {
            Slot::AuthorName => Some(self.author.name.as_str()),
            Slot::AuthorUrl => self.author.url.as_deref(),
            Slot::AuthorIconUrl => self.author.icon_url.as_deref(),
            Slot::Title => self.title.as_deref(),
            Slot::Description => self.description.as_deref(),
            Slot::Url => self.url.as_deref(),
            Slot::Timestamp => self.timestamp.as_deref(),
            Slot::FooterText => self.footer.text.as_deref(),
            Slot::FooterIconUrl => self.footer.icon_url.as_deref(),
            Slot::ImageUrl => self.image.url.as_deref(),
            Slot::ThumbnailUrl => self.thumbnail.url.as_deref(),
            Slot::FieldName(i) => self.fields.get(i).map(|f| f.name.as_str()),
            Slot::FieldValue(i) => self.fields.get(i).map(|f| f.value.as_str()),
            Slot::Color | Slot::FieldInline(_) => None,
        };
        text.filter(|t| !t.is_empty())
    }

    fn field_mut(&mut self, index: usize) -> Result<&mut EmbedField, PathError> {
        let len = self.fields.len();
        self.fields
            .get_mut(index)
            .ok_or(PathError::FieldIndexOutOfRange { index, len })
    }
}

/// One step of a key path into an [`Embed`], e.g. `fields` / `2` / `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Render a path the way it reads in a JSON body, e.g. `fields.0.name`.
pub fn display_path(path: &[PathSegment]) -> String {
    path.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(".")
}

/// Addressable slot of an [`Embed`], resolved from a key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    AuthorName,
    AuthorUrl,
    AuthorIconUrl,
    Title,
    Description,
    Url,
    Timestamp,
    Color,
    FooterText,
    FooterIconUrl,
    ImageUrl,
    ThumbnailUrl,
    FieldName(usize),
    FieldValue(usize),
    FieldInline(usize),
}

impl Slot {
    pub fn resolve(path: &[PathSegment]) -> Result<Slot, PathError> {
        use PathSegment::{Index, Key};

        let keys: Vec<Option<&str>> = path
            .iter()
            .map(|s| match s {
                Key(k) => Some(k.as_str()),
                Index(_) => None,
            })
            .collect();

        let slot = match (path, keys.as_slice()) {
            ([], _) => return Err(PathError::Empty),
            (_, [Some("author"), Some("name")]) => Slot::AuthorName,
            (_, [Some("author"), Some("url")]) => Slot::AuthorUrl,
            (_, [Some("author"), Some("icon_url")]) => Slot::AuthorIconUrl,
            (_, [Some("title")]) => Slot::Title,
            (_, [Some("description")]) => Slot::Description,
            (_, [Some("url")]) => Slot::Url,
            (_, [Some("timestamp")]) => Slot::Timestamp,
            (_, [Some("color")]) => Slot::Color,
            (_, [Some("footer"), Some("text")]) => Slot::FooterText,
            (_, [Some("footer"), Some("icon_url")]) => Slot::FooterIconUrl,
            (_, [Some("image"), Some("url")]) => Slot::ImageUrl,
            (_, [Some("thumbnail"), Some("url")]) => Slot::ThumbnailUrl,
            ([Key(fields), Index(i), Key(attr)], _) if fields == "fields" => match attr.as_str() {
                "name" => Slot::FieldName(*i),
                "value" => Slot::FieldValue(*i),
                "inline" => Slot::FieldInline(*i),
                _ => return Err(PathError::Unknown(display_path(path))),
            },
            _ => return Err(PathError::Unknown(display_path(path))),
        };
        Ok(slot)
    }

    /// Whether chars written here count toward [`EMBED_TOTAL_LIMIT`].
    pub fn counts_toward_total(&self) -> bool {
        matches!(
            self,
            Slot::AuthorName
                | Slot::Title
                | Slot::Description
                | Slot::FooterText
                | Slot::FieldName(_)
                | Slot::FieldValue(_)
        )
    }

    fn is_text(&self) -> bool {
        !matches!(self, Slot::Color | Slot::FieldInline(_))
    }
}

/// Scalar produced by a field binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
    Flag(bool),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Flag(_) => "flag",
        }
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

/// A key path that does not address a writable embed slot.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("key path must contain at least one key")]
    Empty,

    #[error("unknown embed key path `{0}`")]
    Unknown(String),

    #[error("cannot write a {found} value into {slot:?}")]
    TypeMismatch { slot: Slot, found: &'static str },

    #[error("value {value} is out of range for {slot:?}")]
    OutOfRange { slot: Slot, value: u64 },

    #[error("field index {index} is out of range for an embed with {len} fields")]
    FieldIndexOutOfRange { index: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[PathSegment]) -> Vec<PathSegment> {
        segments.to_vec()
    }

    #[test]
    fn resolves_known_paths() {
        assert_eq!(Slot::resolve(&path(&["title".into()])), Ok(Slot::Title));
        assert_eq!(
            Slot::resolve(&path(&["author".into(), "icon_url".into()])),
            Ok(Slot::AuthorIconUrl)
        );
        assert_eq!(
            Slot::resolve(&path(&["fields".into(), 3.into(), "value".into()])),
            Ok(Slot::FieldValue(3))
        );
    }

    #[test]
    fn rejects_empty_and_unknown_paths() {
        assert_eq!(Slot::resolve(&[]), Err(PathError::Empty));
        assert_eq!(
            Slot::resolve(&path(&["fields".into(), "name".into()])),
            Err(PathError::Unknown("fields.name".to_string()))
        );
        assert_eq!(
            Slot::resolve(&path(&["footer".into()])),
            Err(PathError::Unknown("footer".to_string()))
        );
    }

    #[test]
    fn length_counts_only_size_limited_slots() {
        let mut embed = Embed::with_fields(1);
        embed.set(Slot::Title, "abc".into()).unwrap();
        embed.set(Slot::Url, "https://example.com".into()).unwrap();
        embed.set(Slot::FieldName(0), "n".into()).unwrap();
        embed.set(Slot::FieldValue(0), "vv".into()).unwrap();
        embed.set(Slot::AuthorName, "ERROR".into()).unwrap();
        embed.set(Slot::Color, 0xF47B68u32.into()).unwrap();
        assert_eq!(embed.length(), 3 + 1 + 2 + 5);
    }

    #[test]
    fn set_rejects_mismatched_values() {
        let mut embed = Embed::default();
        assert!(matches!(
            embed.set(Slot::Color, "red".into()),
            Err(PathError::TypeMismatch { slot: Slot::Color, .. })
        ));
        assert!(matches!(
            embed.set(Slot::Title, FieldValue::Integer(1)),
            Err(PathError::TypeMismatch { slot: Slot::Title, .. })
        ));
        assert_eq!(
            embed.set(Slot::FieldName(0), "x".into()),
            Err(PathError::FieldIndexOutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn serializes_only_populated_parts() {
        let mut embed = Embed::with_fields(1);
        embed.set(Slot::Title, "boom".into()).unwrap();
        embed.set(Slot::Color, 0x43B581u32.into()).unwrap();
        embed.set(Slot::FieldName(0), "k".into()).unwrap();
        embed.set(Slot::FieldValue(0), "v".into()).unwrap();

        let json = serde_json::to_value(&embed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "boom",
                "color": 0x43B581,
                "fields": [{ "name": "k", "value": "v", "inline": false }],
            })
        );
    }

    #[test]
    fn room_accounts_for_placeholders() {
        let mut embed = Embed::with_fields(2);
        embed.set(Slot::Title, "a".repeat(100).into()).unwrap();
        assert_eq!(embed.room_for(Slot::Description), Some(5900));
        assert_eq!(embed.room_for(Slot::Title), Some(6000));
        // Filling the name alone will cost a `-` for the value.
        assert_eq!(embed.room_for(Slot::FieldName(0)), Some(5899));

        embed.set(Slot::FieldName(0), "n".into()).unwrap();
        assert_eq!(embed.normalized_length(), 102);
        // Writing the value removes that placeholder again.
        assert_eq!(embed.room_for(Slot::FieldValue(0)), Some(5899));
        assert_eq!(embed.room_for(Slot::Url), None);
    }

    #[test]
    fn fix_fields_drops_blank_and_fills_half_empty() {
        let mut embed = Embed::with_fields(3);
        embed.set(Slot::FieldName(1), "only name".into()).unwrap();
        embed.set(Slot::FieldValue(2), "only value".into()).unwrap();
        let before = embed.normalized_length();

        embed.fix_fields();

        let pairs: Vec<(&str, &str)> = embed
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("only name", "-"), ("-", "only value")]);
        assert_eq!(embed.length(), before);
    }
}
