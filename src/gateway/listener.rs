use std::sync::{Arc, PoisonError, RwLock};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::types::response::{ServerError, SubscribeAck, UnsubscribeAck};
use crate::ws::WsError;

bitflags! {
    /// Callbacks a [`Listener`] wants to receive.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// The connection opened.
        const CONNECT = 1;

        /// A subscription was acknowledged.
        const SUBSCRIBE = 1 << 1;

        /// An unsubscription was acknowledged.
        const UNSUBSCRIBE = 1 << 2;

        /// An event arrived for any subscription.
        const MESSAGE = 1 << 3;

        /// The gateway or the transport reported an error.
        const ERROR = 1 << 4;
    }
}

/// Passed to [`Listener::on_connect`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectEvent {
    /// Socket address the client connected to
    pub server: String,
    /// When the connection opened
    pub connected_at: DateTime<Utc>,
}

impl ConnectEvent {
    #[must_use]
    pub fn new(server: String) -> Self {
        Self {
            server,
            connected_at: Utc::now(),
        }
    }
}

/// Passed to [`Listener::on_error`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub enum ErrorEvent<'event> {
    /// An `error` frame sent by the gateway
    Server(&'event ServerError),
    /// The connection failed to open, read or write
    Transport(&'event WsError),
}

/// Observer of connection and protocol events across all subscriptions.
///
/// A listener declares the callbacks it handles through [`Listener::capabilities`];
/// the client only invokes callbacks whose capability is present, so the default
/// (empty) bodies of the others are never reached.
///
/// # Example
///
/// ```
/// use attensys_gateway_client::gateway::{Capabilities, Listener};
/// use serde_json::Value;
///
/// struct Printer;
///
/// impl Listener for Printer {
///     fn capabilities(&self) -> Capabilities {
///         Capabilities::MESSAGE
///     }
///
///     fn on_message(&self, data: &Value) {
///         println!("event: {data}");
///     }
/// }
/// ```
pub trait Listener: Send + Sync {
    /// Callbacks this listener handles.
    fn capabilities(&self) -> Capabilities;

    fn on_connect(&self, _event: &ConnectEvent) {}

    fn on_subscribe(&self, _ack: &SubscribeAck) {}

    fn on_unsubscribe(&self, _ack: &UnsubscribeAck) {}

    /// Receives the `data` of every `event` frame.
    fn on_message(&self, _data: &Value) {}

    fn on_error(&self, _error: ErrorEvent<'_>) {}
}

/// Ordered set of global listeners.
///
/// Entries are compared by `Arc` identity. The same listener may be registered more
/// than once, in which case it is notified once per registration.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Arc<dyn Listener>) {
        // A poisoned lock only means a caller panicked mid-push; the Vec itself is intact.
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove the first entry pointing at `target`. Returns whether one was found.
    pub(crate) fn remove<L: Listener + ?Sized>(&self, target: &Arc<L>) -> bool {
        let target = Arc::as_ptr(target).cast::<()>();
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match listeners
            .iter()
            .position(|listener| Arc::as_ptr(listener).cast::<()>() == target)
        {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Listeners declaring `capability`, in registration order.
    ///
    /// Callers invoke the snapshot after the lock is released, so callbacks may
    /// add or remove listeners themselves.
    pub(crate) fn with_capability(&self, capability: Capabilities) -> Vec<Arc<dyn Listener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|listener| listener.capabilities().contains(capability))
            .map(Arc::clone)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        capabilities: Capabilities,
    }

    impl Listener for Named {
        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }
    }

    fn listener(capabilities: Capabilities) -> Arc<dyn Listener> {
        Arc::new(Named { capabilities })
    }

    fn same(a: &Arc<dyn Listener>, b: &Arc<dyn Listener>) -> bool {
        Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
    }

    #[test]
    fn add_and_remove_preserves_order() {
        let registry = ListenerRegistry::default();
        let a = listener(Capabilities::all());
        let b = listener(Capabilities::all());
        let c = listener(Capabilities::all());

        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&b));
        registry.add(Arc::clone(&c));
        assert!(registry.remove(&b));

        let remaining = registry.with_capability(Capabilities::empty());
        assert_eq!(remaining.len(), 2);
        assert!(same(&remaining[0], &a));
        assert!(same(&remaining[1], &c));
    }

    #[test]
    fn removing_unknown_listener_is_noop() {
        let registry = ListenerRegistry::default();
        let a = listener(Capabilities::all());
        let b = listener(Capabilities::all());
        let stranger = listener(Capabilities::all());

        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&b));

        assert!(!registry.remove(&stranger));
        let remaining = registry.with_capability(Capabilities::empty());
        assert_eq!(remaining.len(), 2);
        assert!(same(&remaining[0], &a));
        assert!(same(&remaining[1], &b), "last entry must not be dropped");
    }

    #[test]
    fn remove_on_empty_registry_is_noop() {
        let registry = ListenerRegistry::default();
        assert!(!registry.remove(&listener(Capabilities::all())));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn duplicate_registration_is_kept_and_removed_one_at_a_time() {
        let registry = ListenerRegistry::default();
        let a = listener(Capabilities::MESSAGE);

        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&a));
        assert_eq!(registry.with_capability(Capabilities::MESSAGE).len(), 2);

        assert!(registry.remove(&a));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
    }

    #[test]
    fn remove_by_concrete_arc() {
        let registry = ListenerRegistry::default();
        let concrete = Arc::new(Named {
            capabilities: Capabilities::ERROR,
        });

        registry.add(Arc::clone(&concrete) as Arc<dyn Listener>);
        assert!(registry.remove(&concrete));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn snapshot_filters_by_capability() {
        let registry = ListenerRegistry::default();
        let messages = listener(Capabilities::MESSAGE);
        let errors = listener(Capabilities::ERROR | Capabilities::CONNECT);

        registry.add(Arc::clone(&messages));
        registry.add(Arc::clone(&errors));

        let for_message = registry.with_capability(Capabilities::MESSAGE);
        assert_eq!(for_message.len(), 1);
        assert!(same(&for_message[0], &messages));

        assert!(registry.with_capability(Capabilities::SUBSCRIBE).is_empty());
        assert_eq!(registry.with_capability(Capabilities::CONNECT).len(), 1);
    }
}
