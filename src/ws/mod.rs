//! Core WebSocket infrastructure.
//!
//! This module owns the transport side of the client: a single connection driven by a
//! background task, which reports lifecycle events through a trait.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: opens the connection, queues outgoing frames, tracks state
//! - [`TransportHandler`]: trait receiving open / message / close / error events
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new(endpoint, &config, Arc::new(dispatcher), token);
//! connection.ensure_open().await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
