//! Client for the event gateway's topic subscription protocol.
//!
//! A [`Client`] holds one WebSocket connection to `ws://<host>/events`. Each call to
//! [`Client::subscribe`] sends a `subscribe` frame and returns a
//! [`SubscriptionHandle`]; once the gateway acknowledges the topic with a
//! subscription id, `event` frames carrying that id are routed to the handle.
//! Global [`Listener`]s observe every connect, acknowledgement, event and error,
//! filtered by the [`Capabilities`] they declare.
//!
//! # Example
//!
//! ```rust, no_run
//! use std::sync::Arc;
//!
//! use attensys_gateway_client::gateway::{
//!     Capabilities, Client, ConnectEvent, Handlers, Listener, SubscribeOptions,
//! };
//!
//! struct Log;
//!
//! impl Listener for Log {
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::CONNECT | Capabilities::ERROR
//!     }
//!
//!     fn on_connect(&self, event: &ConnectEvent) {
//!         println!("connected to {}", event.server);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new("localhost:8080")?;
//!     client.add_listener(Arc::new(Log));
//!
//!     let subscription = client.subscribe(SubscribeOptions::new("orders"));
//!     subscription.on(Handlers::new().on_message(|data| println!("order: {data}")));
//!
//!     client.ensure_open().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
mod dispatcher;
pub mod listener;
pub mod subscription;
pub mod types;

// Re-export commonly used types
pub use client::Client;
pub use listener::{Capabilities, ConnectEvent, ErrorEvent, Listener};
pub use subscription::{Handlers, MessageHandler, SubscriptionHandle};
pub use types::request::{ClientMessage, SubscribeOptions, SubscribeRequest};
pub use types::response::{
    EventMessage, ServerError, ServerMessage, SubscribeAck, UnsubscribeAck, parse_message,
};
