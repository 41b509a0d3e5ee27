use crate::destination::{Destination, DestinationError};
use crate::embed_creator::EmbedMessageCreator;
use crate::handler::DiscordHandler;
use crate::layer::DiscordLayer;
use crate::queue::RetryPolicy;
use crate::record::Severity;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Message layout used by [`init_tracing_with_config`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageStyle {
    /// Formatted line in a code block.
    Monospace,
    /// Formatted line as plain text.
    Plain,
    /// Rich embeds with the message as title.
    Embed,
    /// Rich embeds with the message as description.
    EmbedLongMessage,
}

/// Logging layer configuration.
///
/// **Fields**
/// - `level`: minimum severity that is sent.
/// - `style`: message layout.
/// - `retry`: behaviour on rate limiting, see [`RetryPolicy`].
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`DiscordLayer`] so events are also printed.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub level: Severity,
    pub style: MessageStyle,
    pub retry: RetryPolicy,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            level: Severity::Warn,
            style: MessageStyle::Embed,
            retry: RetryPolicy::default(),
            enable_stdout: true,
        }
    }
}

/// Error returned by [`build_handler`] and the `init_*` functions.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error(transparent)]
    Binding(#[from] crate::binding::BindingError),

    #[error("could not set global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Build a [`DiscordHandler`] for `destination` as described by `config`,
/// using the default transport.
///
/// Must be called from within a Tokio runtime.
pub fn build_handler(
    destination: Destination,
    config: &LayerConfig,
) -> Result<DiscordHandler, InitError> {
    use crate::creator::BasicMessageCreator;

    let builder = DiscordHandler::builder(destination)
        .level(config.level)
        .retry(config.retry);
    let builder = match config.style {
        MessageStyle::Monospace => builder.message_creator(BasicMessageCreator::new(true)),
        MessageStyle::Plain => builder.message_creator(BasicMessageCreator::new(false)),
        MessageStyle::Embed => builder.message_creator(EmbedMessageCreator::builder().build()?),
        MessageStyle::EmbedLongMessage => {
            builder.message_creator(EmbedMessageCreator::long_message()?)
        }
    };
    Ok(builder.build()?)
}

/// Install a global `tracing` subscriber forwarding events to `handler`.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`DiscordLayer`] as the
/// global default subscriber, plus a `fmt` layer when `enable_stdout` is
/// set. The handler's own level decides which events are sent.
pub fn init_tracing_with_handler(
    handler: Arc<DiscordHandler>,
    enable_stdout: bool,
) -> Result<(), InitError> {
    let layer = DiscordLayer::new(handler);

    // Two subscriber shapes, because the stacked type differs.
    if enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Build a handler from `config` and install it globally.
///
/// Returns the handler so callers can [`flush`](DiscordHandler::flush) it
/// before shutting down.
pub fn init_tracing_with_config(
    destination: Destination,
    config: LayerConfig,
) -> Result<Arc<DiscordHandler>, InitError> {
    let handler = Arc::new(build_handler(destination, &config)?);
    init_tracing_with_handler(Arc::clone(&handler), config.enable_stdout)?;
    Ok(handler)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(destination: Destination) -> Result<Arc<DiscordHandler>, InitError> {
    init_tracing_with_config(destination, LayerConfig::default())
}
