#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::error::WsError;
use super::traits::TransportHandler;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, either before the first attempt finished or after close
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Owns the single WebSocket connection of a client.
///
/// The connection is opened once, in a background task, as soon as the manager is
/// created. Transport events are handed to a [`TransportHandler`] from that task.
/// Outgoing frames are queued on an unbounded channel which the task only drains
/// while connected, so anything sent before the open transition is transmitted
/// right after it, in order.
///
/// There is no reconnection: after the connection closes the state stays
/// [`ConnectionState::Disconnected`] and queued frames are discarded.
///
/// # Example
///
/// ```ignore
/// let shutdown = CancellationToken::new();
/// let connection = ConnectionManager::new(
///     "ws://localhost:8080/events".to_owned(),
///     &Config::default(),
///     Arc::new(handler),
///     shutdown.clone(),
/// );
///
/// connection.ensure_open().await?;
/// connection.send(&request)?;
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    /// Watch channel receiver for state changes
    state_rx: watch::Receiver<ConnectionState>,
    /// Sender channel for outgoing messages
    sender_tx: mpsc::UnboundedSender<String>,
    /// Bound applied by [`Self::ensure_open`]
    open_timeout: Option<Duration>,
    /// Cancelled once the connection is closed by its owner
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager and start connecting to `endpoint`.
    ///
    /// Must be called from within a Tokio runtime. Cancelling `shutdown` closes the
    /// connection and stops the background task.
    pub fn new<H: TransportHandler>(
        endpoint: String,
        config: &Config,
        handler: Arc<H>,
        shutdown: CancellationToken,
    ) -> Self {
        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task_shutdown = shutdown.clone();
        tokio::spawn(async move {
            Self::connection_task(endpoint, sender_rx, handler, state_tx, task_shutdown).await;
        });

        Self {
            state_rx,
            sender_tx,
            open_timeout: config.open_timeout,
            shutdown,
        }
    }

    /// Connect once, then run the connection until it ends.
    ///
    /// `state_tx` is dropped when this returns, which releases any pending
    /// [`Self::ensure_open`] waiters.
    async fn connection_task<H: TransportHandler>(
        endpoint: String,
        mut sender_rx: mpsc::UnboundedReceiver<String>,
        handler: Arc<H>,
        state_tx: watch::Sender<ConnectionState>,
        shutdown: CancellationToken,
    ) {
        _ = state_tx.send(ConnectionState::Connecting);

        let connected = tokio::select! {
            () = shutdown.cancelled() => None,
            result = connect_async(endpoint.as_str()) => Some(result),
        };

        let ws_stream = match connected {
            Some(Ok((ws_stream, _))) => ws_stream,
            Some(Err(e)) => {
                let error = WsError::Connection(e);
                #[cfg(feature = "tracing")]
                tracing::warn!(%endpoint, %error, "Unable to connect");
                _ = state_tx.send(ConnectionState::Disconnected);
                handler.on_error(&error);
                handler.on_close();
                return;
            }
            None => {
                _ = state_tx.send(ConnectionState::Disconnected);
                return;
            }
        };

        _ = state_tx.send(ConnectionState::Connected {
            since: Instant::now(),
        });
        handler.on_open(&endpoint);

        let result =
            Self::handle_connection(ws_stream, &mut sender_rx, handler.as_ref(), &shutdown).await;

        _ = state_tx.send(ConnectionState::Disconnected);

        if let Err(error) = result {
            #[cfg(feature = "tracing")]
            tracing::error!(%endpoint, %error, "Error handling connection");
            handler.on_error(&error);
        }
        handler.on_close();
    }

    /// Handle an active WebSocket connection.
    async fn handle_connection<H: TransportHandler>(
        ws_stream: WsStream,
        sender_rx: &mut mpsc::UnboundedReceiver<String>,
        handler: &H,
        shutdown: &CancellationToken,
    ) -> std::result::Result<(), WsError> {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Shutdown requested, closing WebSocket connection");
                    // Best effort; the peer may already be gone.
                    _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }

                // Handle incoming messages
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(%text, "Received WebSocket text message");
                            handler.on_message(text.as_str());
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Err(e)) => return Err(WsError::Connection(e)),
                        Some(Ok(_)) => {
                            // Binary frames are not part of the protocol; PING/PONG is
                            // answered by tungstenite itself.
                        }
                    }
                }

                // Handle outgoing messages queued by the client
                Some(text) = sender_rx.recv() => {
                    write
                        .send(Message::Text(text.into()))
                        .await
                        .map_err(WsError::Connection)?;
                }
            }
        }
    }

    /// Queue a request for transmission once the connection is open.
    pub fn send<R: Serialize>(&self, request: &R) -> Result<()> {
        let json = serde_json::to_string(request)?;
        self.sender_tx
            .send(json)
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Get the current connection state.
    ///
    /// Reports [`ConnectionState::Disconnected`] as soon as `shutdown` is cancelled,
    /// before the background task has sent its Close frame.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.shutdown.is_cancelled() {
            return ConnectionState::Disconnected;
        }
        *self.state_rx.borrow()
    }

    /// Wait until the connection is open.
    ///
    /// Completes immediately when already open. Fails with [`WsError::Timeout`] when the
    /// configured `open_timeout` elapses first, and with [`WsError::ConnectionClosed`]
    /// once `shutdown` is cancelled or the connection task has ended without (or after)
    /// opening.
    pub async fn ensure_open(&self) -> Result<()> {
        let mut state_rx = self.state_rx.clone();
        let wait = async {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => Err(WsError::ConnectionClosed),
                opened = state_rx.wait_for(|state| state.is_connected()) => opened
                    .map(drop)
                    .map_err(|_closed| WsError::ConnectionClosed),
            }
        };

        let opened = match self.open_timeout {
            Some(limit) => timeout(limit, wait)
                .await
                .map_err(|_elapsed| WsError::Timeout)?,
            None => wait.await,
        };

        opened?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::net::TcpListener;

    use super::*;
    use crate::error::Kind;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl TransportHandler for Recorder {
        fn on_open(&self, endpoint: &str) {
            self.events.lock().unwrap().push(format!("open {endpoint}"));
        }

        fn on_message(&self, text: &str) {
            self.events.lock().unwrap().push(format!("message {text}"));
        }

        fn on_close(&self) {
            self.events.lock().unwrap().push("close".to_owned());
        }

        fn on_error(&self, _error: &WsError) {
            self.events.lock().unwrap().push("error".to_owned());
        }
    }

    async fn unreachable_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}/events")
    }

    #[test]
    fn connected_state_is_open() {
        assert!(
            ConnectionState::Connected {
                since: Instant::now()
            }
            .is_connected()
        );
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }

    #[tokio::test]
    async fn failed_connect_reports_error_then_close() {
        let recorder = Arc::new(Recorder::default());
        let connection = ConnectionManager::new(
            unreachable_endpoint().await,
            &Config::default(),
            Arc::clone(&recorder),
            CancellationToken::new(),
        );

        let error = connection.ensure_open().await.unwrap_err();
        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(!connection.state().is_connected());
        assert_eq!(recorder.events(), vec!["error".to_owned(), "close".to_owned()]);
    }

    #[tokio::test]
    async fn ensure_open_honors_timeout() {
        // Accepts TCP but never completes the WebSocket handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = Config {
            open_timeout: Some(Duration::from_millis(100)),
            ..Config::default()
        };
        let connection = ConnectionManager::new(
            format!("ws://{addr}/events"),
            &config,
            Arc::new(Recorder::default()),
            CancellationToken::new(),
        );

        let error = connection.ensure_open().await.unwrap_err();
        assert!(matches!(error.downcast_ref::<WsError>(), Some(WsError::Timeout)));
        drop(listener);
    }

    #[tokio::test]
    async fn cancelled_shutdown_is_visible_before_task_runs() {
        // Accepts TCP but never completes the WebSocket handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = CancellationToken::new();
        let connection = ConnectionManager::new(
            format!("ws://{addr}/events"),
            &Config::default(),
            Arc::new(Recorder::default()),
            shutdown.clone(),
        );

        shutdown.cancel();

        assert_eq!(connection.state(), ConnectionState::Disconnected);
        let error = connection.ensure_open().await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<WsError>(),
            Some(WsError::ConnectionClosed)
        ));
        drop(listener);
    }
}
