use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::dispatcher::Dispatcher;
use super::listener::{Listener, ListenerRegistry};
use super::subscription::{SubscriptionHandle, SubscriptionRegistry};
use super::types::request::SubscribeOptions;
use crate::Result;
use crate::error::{Error, Kind};
use crate::ws::ConnectionManager;
use crate::ws::config::Config;
use crate::ws::connection::ConnectionState;

/// Client for the event gateway's topic subscription protocol.
///
/// Creating a client starts connecting to `ws://<host>/events` right away, in the
/// background. Subscriptions and listeners can be registered immediately; subscribe
/// frames are held back until the socket is open and then sent in call order.
///
/// Cloning is cheap and every clone shares the same connection. The connection is
/// closed when the last clone is dropped, or earlier through [`Client::close`].
///
/// # Example
///
/// ```rust, no_run
/// use attensys_gateway_client::gateway::{Client, SubscribeOptions};
/// use futures::StreamExt as _;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("localhost:8080")?;
///
///     let options = SubscribeOptions::builder()
///         .topic("prices")
///         .query("symbol=BTC")
///         .limit(10)
///         .build();
///     let stream = client.subscribe(options).into_stream();
///     let mut stream = Box::pin(stream);
///
///     client.ensure_open().await?;
///     while let Some(data) = stream.next().await {
///         println!("price: {data}");
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Socket address, e.g. `ws://localhost:8080/events`
    address: String,
    /// Connection manager for the WebSocket
    connection: ConnectionManager,
    listeners: Arc<ListenerRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    /// Cancels the connection task
    shutdown: CancellationToken,
    /// Cancels `shutdown` once the last clone of the client is dropped
    _guard: DropGuard,
}

impl Client {
    /// Connect to the gateway at `host` (`hostname[:port]`) with the default configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(host: &str) -> Result<Self> {
        Self::with_config(host, &Config::default())
    }

    /// Connect to the gateway at `host` with a custom [`Config`].
    ///
    /// Fails when `host` does not form a valid socket address, or when called outside
    /// a Tokio runtime. Connection failures are not reported here; they reach
    /// listeners with [`super::Capabilities::ERROR`] and [`Client::ensure_open`].
    pub fn with_config(host: &str, config: &Config) -> Result<Self> {
        let address = config.endpoint(host)?;
        Handle::try_current().map_err(|e| Error::with_source(Kind::Internal, e))?;

        let listeners = Arc::new(ListenerRegistry::default());
        let subscriptions = Arc::new(SubscriptionRegistry::default());
        let dispatcher = Arc::new(Dispatcher::new(
            address.clone(),
            Arc::clone(&listeners),
            Arc::clone(&subscriptions),
        ));

        let shutdown = CancellationToken::new();
        let connection =
            ConnectionManager::new(address.clone(), config, dispatcher, shutdown.clone());

        #[cfg(feature = "tracing")]
        tracing::debug!(%address, "Connecting to event gateway");

        Ok(Self {
            inner: Arc::new(ClientInner {
                address,
                connection,
                listeners,
                subscriptions,
                _guard: shutdown.clone().drop_guard(),
                shutdown,
            }),
        })
    }

    /// Socket address this client connects to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Whether the connection is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.connection.state().is_connected()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Wait until the connection is open.
    ///
    /// Resolves immediately when it already is. Fails once the connection has ended
    /// without opening (or after it closed), or when [`Config::open_timeout`] elapses.
    pub async fn ensure_open(&self) -> Result<()> {
        self.inner.connection.ensure_open().await
    }

    /// Register a global listener and hand it back.
    ///
    /// Listeners are notified in registration order. Registering the same listener
    /// twice makes it receive every callback twice.
    pub fn add_listener<L: Listener + 'static>(&self, listener: Arc<L>) -> Arc<L> {
        self.inner
            .listeners
            .add(Arc::clone(&listener) as Arc<dyn Listener>);
        listener
    }

    /// Remove one registration of `listener`, compared by identity.
    ///
    /// Returns `false`, and changes nothing, when it is not registered.
    pub fn remove_listener<L: Listener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Number of registered listeners, counting duplicates.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Subscribe to a topic.
    ///
    /// The handle is returned synchronously. The subscribe frame is sent as soon as
    /// the connection is open; events are routed to the handle once the gateway
    /// acknowledges it. Subscriptions last as long as the client.
    #[expect(
        clippy::needless_pass_by_value,
        reason = "Options are built inline at the call site and owned by the subscription"
    )]
    pub fn subscribe(&self, options: SubscribeOptions) -> SubscriptionHandle {
        let topic = options.effective_topic();
        let key = self.inner.subscriptions.register(topic.clone());

        #[cfg(feature = "tracing")]
        tracing::debug!(%topic, limit = ?options.limit, "Subscribing");

        if let Err(e) = self.inner.connection.send(&options.to_request()) {
            #[cfg(feature = "tracing")]
            tracing::warn!(%topic, error = %e, "Unable to queue subscribe request");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }

        SubscriptionHandle::new(key, topic, Arc::clone(&self.inner.subscriptions))
    }

    /// Number of subscriptions made through this client.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    /// Close the connection for every clone of this client.
    ///
    /// Takes effect immediately: [`Client::is_open`] returns `false` and
    /// [`Client::ensure_open`] fails from this call on, while the Close frame is sent
    /// in the background.
    ///
    /// Listeners are not notified of a close. Subscribing afterwards still returns a
    /// handle, but nothing is sent.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }
}
