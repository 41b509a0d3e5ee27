use std::sync::Arc;

use tracing::debug;

use crate::binding::BindingError;
use crate::creator::{default_format, BasicMessageCreator, FormatFn, MessageCreator};
use crate::destination::{Destination, DestinationError};
use crate::queue::{DeliveryError, DeliveryQueue, QueueClosed, RetryPolicy};
use crate::record::{LogEvent, Severity};
use crate::transport::Transport;

/// Error raised synchronously by [`DiscordHandler::emit`]. Delivery
/// failures are never reported here; see [`DiscordHandler::flush`].
#[derive(thiserror::Error, Debug)]
pub enum EmitError {
    #[error("could not build message: {0}")]
    Binding(#[from] BindingError),

    #[error("could not serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Closed(#[from] QueueClosed),
}

/// Turns [`LogEvent`]s into messages for one [`Destination`] and queues
/// them for ordered background delivery.
///
/// `emit` only does CPU work and a non-blocking enqueue, so it is safe to
/// call from any logging call site.
pub struct DiscordHandler {
    destination: Destination,
    creator: Arc<dyn MessageCreator>,
    format: Arc<FormatFn>,
    level: Severity,
    queue: DeliveryQueue,
}

impl DiscordHandler {
    pub fn builder(destination: Destination) -> HandlerBuilder {
        HandlerBuilder {
            destination,
            creator: None,
            format: None,
            level: Severity::Trace,
            retry: RetryPolicy::default(),
            transport: None,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Whether events of `level` are sent at all.
    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.level
    }

    /// Build the messages for `event` and queue them in order.
    pub fn emit(&self, event: &LogEvent) -> Result<(), EmitError> {
        if !self.enabled(event.level) {
            return Ok(());
        }
        let payloads = self.creator.messages(event, &*self.format)?;
        debug!(url = %self.destination.url, messages = payloads.len(), "queueing log event");
        for payload in payloads {
            let body = self.destination.prepare(payload.to_body()?);
            self.queue.enqueue(body)?;
        }
        Ok(())
    }

    /// Wait for everything emitted so far to be delivered and report the
    /// last delivery failure, if any.
    pub async fn flush(&self) -> Result<(), DeliveryError> {
        self.queue.flush().await
    }

    pub fn last_error(&self) -> Option<DeliveryError> {
        self.queue.last_error()
    }

    pub fn take_last_error(&self) -> Option<DeliveryError> {
        self.queue.take_last_error()
    }
}

/// Configures a [`DiscordHandler`].
pub struct HandlerBuilder {
    destination: Destination,
    creator: Option<Arc<dyn MessageCreator>>,
    format: Option<Arc<FormatFn>>,
    level: Severity,
    retry: RetryPolicy,
    transport: Option<Arc<dyn Transport>>,
}

impl HandlerBuilder {
    /// Defaults to a monospace [`BasicMessageCreator`].
    pub fn message_creator<C>(mut self, creator: C) -> Self
    where
        C: MessageCreator + 'static,
    {
        self.creator = Some(Arc::new(creator));
        self
    }

    /// Line format handed to the message creator. Defaults to
    /// [`default_format`].
    pub fn format<F>(mut self, format: F) -> Self
    where
        F: Fn(&LogEvent) -> String + Send + Sync + 'static,
    {
        self.format = Some(Arc::new(format));
        self
    }

    /// Events below `level` are ignored.
    pub fn level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Defaults to a `reqwest` transport carrying the destination headers.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the handler and start its delivery worker on the current
    /// Tokio runtime.
    pub fn build(self) -> Result<DiscordHandler, DestinationError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.destination)?,
        };
        let (queue, _worker) =
            DeliveryQueue::spawn(self.destination.url.clone(), transport, self.retry);

        Ok(DiscordHandler {
            destination: self.destination,
            creator: self
                .creator
                .unwrap_or_else(|| Arc::new(BasicMessageCreator::default())),
            format: self.format.unwrap_or_else(|| Arc::new(default_format)),
            level: self.level,
            queue,
        })
    }
}

#[cfg(feature = "http")]
fn default_transport(destination: &Destination) -> Result<Arc<dyn Transport>, DestinationError> {
    Ok(Arc::new(destination.transport()?))
}

#[cfg(not(feature = "http"))]
fn default_transport(_destination: &Destination) -> Result<Arc<dyn Transport>, DestinationError> {
    Err(DestinationError::Http("http feature is not enabled; supply a transport".to_string()))
}
