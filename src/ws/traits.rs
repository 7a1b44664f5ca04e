//! Core traits for generic WebSocket infrastructure.

use super::error::WsError;

/// Receives transport lifecycle events from a [`super::ConnectionManager`].
///
/// All callbacks are invoked from the single connection task, in the order the
/// transport produced them, so implementations observe a consistent sequence:
/// at most one `on_open`, any number of `on_message`, then `on_close`.
/// `on_error` precedes `on_close` when the connection ends abnormally.
///
/// # Example
///
/// ```ignore
/// struct Printer;
///
/// impl TransportHandler for Printer {
///     fn on_open(&self, endpoint: &str) { println!("open {endpoint}"); }
///     fn on_message(&self, text: &str) { println!("{text}"); }
///     fn on_close(&self) {}
///     fn on_error(&self, error: &WsError) { eprintln!("{error}"); }
/// }
/// ```
pub trait TransportHandler: Send + Sync + 'static {
    /// The connection to `endpoint` has been established.
    fn on_open(&self, endpoint: &str);

    /// A complete text frame arrived.
    fn on_message(&self, text: &str);

    /// The connection has ended and will not be reopened.
    fn on_close(&self);

    /// The transport failed to connect, read or write.
    fn on_error(&self, error: &WsError);
}
