use std::sync::Arc;

use super::listener::{Capabilities, ConnectEvent, ErrorEvent, ListenerRegistry};
use super::subscription::SubscriptionRegistry;
use super::types::response::{EventMessage, ServerMessage, SubscribeAck, parse_message};
use crate::ws::{TransportHandler, WsError};

/// Routes transport events to global listeners and subscription handlers.
///
/// Runs on the connection task. Callbacks are invoked on snapshots taken from the
/// registries, never while a registry lock is held.
pub(crate) struct Dispatcher {
    address: String,
    listeners: Arc<ListenerRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl Dispatcher {
    pub(crate) fn new(
        address: String,
        listeners: Arc<ListenerRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            address,
            listeners,
            subscriptions,
        }
    }

    fn dispatch(&self, message: &ServerMessage) {
        match message {
            ServerMessage::SubscribeAck(ack) => self.subscribed(ack),
            ServerMessage::UnsubscribeAck(ack) => {
                for listener in self.listeners.with_capability(Capabilities::UNSUBSCRIBE) {
                    listener.on_unsubscribe(ack);
                }
            }
            ServerMessage::Event(event) => self.event(event),
            ServerMessage::Error(error) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(message = ?error.message(), "Gateway reported an error");
                for listener in self.listeners.with_capability(Capabilities::ERROR) {
                    listener.on_error(ErrorEvent::Server(error));
                }
            }
        }
    }

    fn subscribed(&self, ack: &SubscribeAck) {
        // Ids are assigned before listeners run, so `on_subscribe` sees acknowledged handles.
        let updated = self
            .subscriptions
            .acknowledge(&ack.topic, &ack.subscription_id);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            topic = %ack.topic,
            subscription_id = %ack.subscription_id,
            updated,
            "Subscription acknowledged"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = updated;

        for listener in self.listeners.with_capability(Capabilities::SUBSCRIBE) {
            listener.on_subscribe(ack);
        }
    }

    fn event(&self, event: &EventMessage) {
        for listener in self.listeners.with_capability(Capabilities::MESSAGE) {
            listener.on_message(&event.data);
        }

        for handler in self.subscriptions.message_handlers(&event.subscription_id) {
            handler(&event.data);
        }
    }
}

impl TransportHandler for Dispatcher {
    fn on_open(&self, endpoint: &str) {
        #[cfg(feature = "tracing")]
        tracing::info!("connected to {endpoint}");
        #[cfg(not(feature = "tracing"))]
        let _ = endpoint;

        let event = ConnectEvent::new(self.address.clone());
        for listener in self.listeners.with_capability(Capabilities::CONNECT) {
            listener.on_connect(&event);
        }
    }

    fn on_message(&self, text: &str) {
        match parse_message(text) {
            Ok(message) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(kind = message.kind(), "Dispatching gateway message");
                self.dispatch(&message);
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, error = %e, "Dropping malformed gateway frame");
                #[cfg(not(feature = "tracing"))]
                let _ = (&text, &e);
            }
        }
    }

    fn on_close(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!("disconnected from {}", self.address);
    }

    fn on_error(&self, error: &WsError) {
        for listener in self.listeners.with_capability(Capabilities::ERROR) {
            listener.on_error(ErrorEvent::Transport(error));
        }
    }
}
