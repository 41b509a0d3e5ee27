use std::sync::Arc;

use crate::binding::{BindingError, FieldBinding};
use crate::colours::LevelColours;
use crate::creator::{FormatFn, MessageCreator, Payload};
use crate::embed::{
    Embed, FieldValue, PathSegment, Slot, AUTHOR_NAME_LIMIT, BATCH_EMBED_LIMIT, BATCH_TOTAL_LIMIT,
    DESCRIPTION_LIMIT, FIELD_NAME_LIMIT, FIELD_VALUE_LIMIT, FOOTER_TEXT_LIMIT, TITLE_LIMIT,
};
use crate::record::LogEvent;

/// Produces the text of one embed slot. An empty string leaves the slot
/// unset.
pub type TextFn = Arc<dyn Fn(&LogEvent) -> String + Send + Sync>;

fn text_fn<F>(f: F) -> TextFn
where
    F: Fn(&LogEvent) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}

fn empty() -> TextFn {
    text_fn(|_| String::new())
}

/// A named entry of the embed's `fields` list.
#[derive(Clone)]
pub struct EmbedFieldDef {
    pub name: TextFn,
    pub value: TextFn,
    pub inline: bool,
}

impl EmbedFieldDef {
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Fn(&LogEvent) -> String + Send + Sync + 'static,
        V: Fn(&LogEvent) -> String + Send + Sync + 'static,
    {
        EmbedFieldDef {
            name: text_fn(name),
            value: text_fn(value),
            inline: false,
        }
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// `<kind>: <message>` over the fenced trace, both empty when the event
    /// carries no exception so the field is dropped.
    pub fn exception() -> Self {
        EmbedFieldDef::new(
            |event| {
                event
                    .exception
                    .as_ref()
                    .map(|exc| format!("{}: {}", exc.kind, exc.message))
                    .unwrap_or_default()
            },
            |event| {
                event
                    .exception
                    .as_ref()
                    .and_then(|exc| exc.trace.as_deref())
                    .map(|trace| format!("```{}```", trace))
                    .unwrap_or_default()
            },
        )
    }
}

/// Lays each event out as one or more embeds, grouped into as few messages
/// as the batch limits allow.
///
/// The order of the bindings decides which slots spill into continuation
/// embeds first. Build one with [`EmbedMessageCreator::builder`] or pass
/// a complete binding list to [`EmbedMessageCreator::new`].
#[derive(Debug, Clone)]
pub struct EmbedMessageCreator {
    bindings: Vec<FieldBinding>,
    colours: LevelColours,
    n_fields: usize,
}

impl EmbedMessageCreator {
    /// Use `bindings` as-is, in order. Every embed is created with as many
    /// named fields as the bindings address and with the level colour set.
    pub fn new(bindings: Vec<FieldBinding>, colours: LevelColours) -> Self {
        let n_fields = bindings
            .iter()
            .filter_map(|b| match b.slot() {
                Slot::FieldName(i) | Slot::FieldValue(i) | Slot::FieldInline(i) => Some(i + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        EmbedMessageCreator {
            bindings,
            colours,
            n_fields,
        }
    }

    pub fn builder() -> EmbedCreatorBuilder {
        EmbedCreatorBuilder::default()
    }

    /// Message in the description, location in the title. Suits messages
    /// longer than the title limit.
    pub fn long_message() -> Result<Self, BindingError> {
        EmbedMessageCreator::builder()
            .title(|event| event.location())
            .description(|event| format!("**{}**", event.message))
            .build()
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// An empty embed carrying the fields every embed of `event` shares.
    pub fn new_embed(&self, event: &LogEvent) -> Embed {
        let mut embed = Embed::with_fields(self.n_fields);
        embed.color = Some(self.colours.get(event.level));
        embed
    }

    /// Every embed for `event`, in order, before grouping.
    pub fn embeds(&self, event: &LogEvent) -> Result<Vec<Embed>, BindingError> {
        let factory = |event: &LogEvent| self.new_embed(event);
        let mut embeds = vec![self.new_embed(event)];
        for binding in &self.bindings {
            binding.pack(&mut embeds, event, &factory)?;
        }
        for embed in &mut embeds {
            embed.fix_fields();
        }
        Ok(embeds)
    }
}

impl MessageCreator for EmbedMessageCreator {
    fn messages(&self, event: &LogEvent, _format: &FormatFn) -> Result<Vec<Payload>, BindingError> {
        let embeds = self.embeds(event)?;
        Ok(group_embeds(embeds).into_iter().map(Payload::Embeds).collect())
    }
}

/// Group consecutive embeds into messages of at most [`BATCH_EMBED_LIMIT`]
/// embeds and [`BATCH_TOTAL_LIMIT`] chars. No group is ever empty.
pub fn group_embeds(embeds: Vec<Embed>) -> Vec<Vec<Embed>> {
    let mut groups = Vec::new();
    let mut group: Vec<Embed> = Vec::new();
    let mut size = 0;

    for embed in embeds {
        let length = embed.length();
        let full = group.len() >= BATCH_EMBED_LIMIT || size + length > BATCH_TOTAL_LIMIT;
        if !group.is_empty() && full {
            groups.push(std::mem::take(&mut group));
            size = 0;
        }
        size += length;
        group.push(embed);
    }
    if !group.is_empty() {
        groups.push(group);
    }
    groups
}

/// Builder for the default embed layout.
///
/// Slots, in packing order: colour, thumbnail url, author url, author icon
/// url, author name, title, description, url, user fields, exception field,
/// footer icon url, footer text, timestamp, image url.
pub struct EmbedCreatorBuilder {
    colours: LevelColours,
    thumbnail_url: TextFn,
    author_url: TextFn,
    author_icon_url: TextFn,
    author_name: TextFn,
    title: TextFn,
    description: TextFn,
    url: TextFn,
    fields: Vec<EmbedFieldDef>,
    exception_field: bool,
    footer_icon_url: TextFn,
    footer_text: TextFn,
    timestamp: TextFn,
    image_url: TextFn,
}

impl Default for EmbedCreatorBuilder {
    fn default() -> Self {
        EmbedCreatorBuilder {
            colours: LevelColours::default(),
            thumbnail_url: empty(),
            author_url: empty(),
            author_icon_url: empty(),
            author_name: text_fn(|event| event.level.to_string()),
            title: text_fn(|event| event.message.clone()),
            description: text_fn(|event| event.location()),
            url: empty(),
            fields: Vec::new(),
            exception_field: true,
            footer_icon_url: empty(),
            footer_text: empty(),
            timestamp: text_fn(|event| event.timestamp.to_rfc3339()),
            image_url: empty(),
        }
    }
}

macro_rules! text_setters {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name<F>(mut self, f: F) -> Self
            where
                F: Fn(&LogEvent) -> String + Send + Sync + 'static,
            {
                self.$name = text_fn(f);
                self
            }
        )*
    };
}

impl EmbedCreatorBuilder {
    text_setters!(
        thumbnail_url,
        author_url,
        author_icon_url,
        /// Defaults to the level name.
        author_name,
        /// Defaults to the message.
        title,
        /// Defaults to the file and line of the event.
        description,
        url,
        footer_icon_url,
        footer_text,
        /// Defaults to the RFC 3339 event time.
        timestamp,
        image_url,
    );

    pub fn colours(mut self, colours: LevelColours) -> Self {
        self.colours = colours;
        self
    }

    /// Author icon `<base_url>/<level>.png`, e.g. `.../images/error.png`.
    pub fn level_icons(self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        self.author_icon_url(move |event| {
            format!("{}/{}.png", base_url, event.level.as_str().to_lowercase())
        })
    }

    /// Append a named field. Fields appear in the order they are added,
    /// before the exception field.
    pub fn field(mut self, field: EmbedFieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Whether to add the exception summary field. On by default.
    pub fn exception_field(mut self, enabled: bool) -> Self {
        self.exception_field = enabled;
        self
    }

    pub fn build(self) -> Result<EmbedMessageCreator, BindingError> {
        let colours = self.colours.clone();
        let colour =
            move |event: &LogEvent| Some(FieldValue::Integer(colours.get(event.level).into()));

        let mut bindings = vec![
            FieldBinding::new(vec!["color".into()], colour, None)?,
            bind(&["thumbnail", "url"], &self.thumbnail_url, None)?,
            bind(&["author", "url"], &self.author_url, None)?,
            bind(&["author", "icon_url"], &self.author_icon_url, None)?,
            bind(&["author", "name"], &self.author_name, Some(AUTHOR_NAME_LIMIT))?,
            bind(&["title"], &self.title, Some(TITLE_LIMIT))?,
            bind(&["description"], &self.description, Some(DESCRIPTION_LIMIT))?,
            bind(&["url"], &self.url, None)?,
        ];

        let mut fields = self.fields;
        if self.exception_field {
            fields.push(EmbedFieldDef::exception());
        }
        for (i, field) in fields.into_iter().enumerate() {
            let path = |attr: &str| vec![PathSegment::from("fields"), i.into(), attr.into()];
            bindings.push(text(path("name"), field.name, Some(FIELD_NAME_LIMIT))?);
            bindings.push(text(path("value"), field.value, Some(FIELD_VALUE_LIMIT))?);
            let inline = field.inline;
            let inline = move |_: &LogEvent| Some(FieldValue::Flag(inline));
            bindings.push(FieldBinding::new(path("inline"), inline, None)?);
        }

        bindings.extend([
            bind(&["footer", "icon_url"], &self.footer_icon_url, None)?,
            bind(&["footer", "text"], &self.footer_text, Some(FOOTER_TEXT_LIMIT))?,
            bind(&["timestamp"], &self.timestamp, None)?,
            bind(&["image", "url"], &self.image_url, None)?,
        ]);

        Ok(EmbedMessageCreator::new(bindings, self.colours))
    }
}

fn bind(
    keys: &[&str],
    producer: &TextFn,
    limit: Option<usize>,
) -> Result<FieldBinding, BindingError> {
    let path = keys.iter().map(|k| PathSegment::from(*k)).collect();
    text(path, Arc::clone(producer), limit)
}

fn text(
    path: Vec<PathSegment>,
    producer: TextFn,
    limit: Option<usize>,
) -> Result<FieldBinding, BindingError> {
    FieldBinding::text(path, move |event| producer(event), limit)
}
