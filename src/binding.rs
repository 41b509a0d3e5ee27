use std::fmt;
use std::sync::Arc;

use crate::chunks::split_chars;
use crate::embed::{display_path, Embed, FieldValue, PathError, PathSegment, Slot};
use crate::record::LogEvent;

/// Pulls one value out of a [`LogEvent`]. `None` means "leave the slot
/// alone".
pub type Producer = Arc<dyn Fn(&LogEvent) -> Option<FieldValue> + Send + Sync>;

/// Creates each embed a single event is split into, pre-filled with the
/// sticky fields shared by all of them.
pub type EmbedFactory<'a> = &'a dyn Fn(&LogEvent) -> Embed;

/// Error raised for a misconfigured binding. These are programmer errors
/// and are never retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("binding for `{0}` has a zero length limit")]
    ZeroLimit(String),

    #[error("a freshly created embed has no room left for `{0}`")]
    NoRoom(String),
}

/// Binds a slot of an [`Embed`] to a value taken from each [`LogEvent`].
///
/// Text that does not fit in the current embed is continued in new embeds
/// made by an [`EmbedFactory`]. Concatenating the pieces written across
/// the chain reproduces the original value.
#[derive(Clone)]
pub struct FieldBinding {
    path: Vec<PathSegment>,
    slot: Slot,
    producer: Producer,
    limit: Option<usize>,
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("path", &display_path(&self.path))
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl FieldBinding {
    /// Fails if `path` is empty or does not name a writable slot, or if
    /// `limit` is zero.
    pub fn new<F>(
        path: Vec<PathSegment>,
        producer: F,
        limit: Option<usize>,
    ) -> Result<Self, BindingError>
    where
        F: Fn(&LogEvent) -> Option<FieldValue> + Send + Sync + 'static,
    {
        let slot = Slot::resolve(&path)?;
        if limit == Some(0) {
            return Err(BindingError::ZeroLimit(display_path(&path)));
        }
        Ok(FieldBinding {
            path,
            slot,
            producer: Arc::new(producer),
            limit,
        })
    }

    /// Shorthand for a text producer; an empty string leaves the slot alone.
    pub fn text<F>(
        path: Vec<PathSegment>,
        producer: F,
        limit: Option<usize>,
    ) -> Result<Self, BindingError>
    where
        F: Fn(&LogEvent) -> String + Send + Sync + 'static,
    {
        FieldBinding::new(path, move |event| Some(FieldValue::Text(producer(event))), limit)
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Write this binding's value for `event` into the last embed of
    /// `embeds`, appending continuation embeds from `new_embed` while text
    /// is left over.
    ///
    /// The room in each embed is the smaller of this binding's limit and
    /// what is left of the embed-wide budget (see [`Embed::room_for`]).
    /// Non-text values are written as-is and never split.
    pub fn pack(
        &self,
        embeds: &mut Vec<Embed>,
        event: &LogEvent,
        new_embed: EmbedFactory<'_>,
    ) -> Result<(), BindingError> {
        let text = match (self.producer)(event) {
            None => return Ok(()),
            Some(FieldValue::Text(text)) => text,
            Some(scalar) => {
                let embed = current(embeds, event, new_embed);
                embed.set(self.slot, scalar)?;
                return Ok(());
            }
        };

        let mut rest = text.as_str();
        while !rest.is_empty() {
            let embed = current(embeds, event, new_embed);
            let (committed, remainder) = match self.room(embed) {
                Some(room) => split_chars(rest, room),
                None => (rest, ""),
            };
            if !committed.is_empty() {
                embed.set(self.slot, FieldValue::Text(committed.to_string()))?;
            }
            if remainder.is_empty() {
                break;
            }

            let next = new_embed(event);
            if self.room(&next) == Some(0) {
                return Err(BindingError::NoRoom(display_path(&self.path)));
            }
            embeds.push(next);
            rest = remainder;
        }
        Ok(())
    }

    fn room(&self, embed: &Embed) -> Option<usize> {
        match (self.limit, embed.room_for(self.slot)) {
            (Some(limit), Some(room)) => Some(limit.min(room)),
            (limit, room) => limit.or(room),
        }
    }
}

fn current<'e>(
    embeds: &'e mut Vec<Embed>,
    event: &LogEvent,
    new_embed: EmbedFactory<'_>,
) -> &'e mut Embed {
    if embeds.is_empty() {
        embeds.push(new_embed(event));
    }
    let last = embeds.len() - 1;
    &mut embeds[last]
}
