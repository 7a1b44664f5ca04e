#![expect(
    clippy::module_name_repetitions,
    reason = "Subscription types deliberately include the module name for clarity"
)]

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_stream::stream;
use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

/// Callback invoked with the `data` of an event addressed to a subscription.
pub type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handlers attached to a subscription through [`SubscriptionHandle::on`].
#[non_exhaustive]
#[derive(Clone, Default)]
pub struct Handlers {
    /// Invoked for every `event` frame carrying this subscription's id
    pub message: Option<MessageHandler>,
}

impl Handlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `message` handler.
    #[must_use]
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.message = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("message", &self.message.is_some())
            .finish()
    }
}

/// Local record of one `subscribe` call.
struct Subscription {
    topic: String,
    id: Option<String>,
    handlers: Option<Handlers>,
}

/// Ordered record of every subscription made through a client.
///
/// Records are never removed, so a record's position is a stable key for its handle.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: RwLock<Vec<Subscription>>,
}

impl SubscriptionRegistry {
    /// Register a new subscription for `topic` and return its key.
    pub(crate) fn register(&self, topic: String) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(Subscription {
            topic,
            id: None,
            handlers: None,
        });
        entries.len() - 1
    }

    /// Replace the handlers of the subscription at `key`.
    pub(crate) fn set_handlers(&self, key: usize, handlers: Handlers) {
        if let Some(entry) = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(key)
        {
            entry.handlers = Some(handlers);
        }
    }

    /// Assign `subscription_id` to every not yet acknowledged subscription for `topic`.
    ///
    /// Returns how many subscriptions were updated. An id, once assigned, is never
    /// replaced by a later acknowledgement.
    pub(crate) fn acknowledge(&self, topic: &str, subscription_id: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = 0;
        for entry in entries
            .iter_mut()
            .filter(|entry| entry.topic == topic && entry.id.is_none())
        {
            entry.id = Some(subscription_id.to_owned());
            updated += 1;
        }
        updated
    }

    /// Message handlers of the subscriptions with `subscription_id`, in creation order.
    pub(crate) fn message_handlers(&self, subscription_id: &str) -> Vec<MessageHandler> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.id.as_deref() == Some(subscription_id))
            .filter_map(|entry| entry.handlers.as_ref()?.message.clone())
            .collect()
    }

    pub(crate) fn subscription_id(&self, key: usize) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)?
            .id
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by [`crate::gateway::Client::subscribe`].
///
/// The handle can be used as soon as it is returned, before the subscribe frame
/// reaches the gateway. Events start routing to it once the gateway acknowledges the
/// subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    key: usize,
    topic: String,
    registry: Arc<SubscriptionRegistry>,
}

impl SubscriptionHandle {
    pub(crate) fn new(key: usize, topic: String, registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            key,
            topic,
            registry,
        }
    }

    /// Attach handlers to this subscription, replacing any attached before.
    pub fn on(&self, handlers: Handlers) {
        self.registry.set_handlers(self.key, handlers);
    }

    /// Effective topic, including any `?query` suffix.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Id assigned by the gateway, once the subscription has been acknowledged.
    #[must_use]
    pub fn subscription_id(&self) -> Option<String> {
        self.registry.subscription_id(self.key)
    }

    /// Turn this subscription into a stream of event payloads.
    ///
    /// This attaches a message handler, replacing any set with [`Self::on`]. The
    /// stream ends if another `on` call replaces that handler, or once the client
    /// and all of its handles are dropped.
    pub fn into_stream(self) -> impl Stream<Item = Value> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.on(Handlers::new().on_message(move |data| {
            // The receiver is gone once the stream is dropped; nothing left to notify.
            _ = tx.send(data.clone());
        }));

        stream! {
            while let Some(data) = rx.recv().await {
                yield data;
            }
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("topic", &self.topic)
            .field("subscription_id", &self.subscription_id())
            .finish_non_exhaustive()
    }
}
