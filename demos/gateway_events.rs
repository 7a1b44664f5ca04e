//! Event gateway explorer.
//!
//! This example connects to a gateway and:
//! 1. Logs connect, acknowledgement and error callbacks through a global listener
//! 2. Subscribes to a topic with a query and a limit, streaming its events
//! 3. Shows connection state and subscription count
//!
//! Run with tracing enabled:
//! ```sh
//! GATEWAY_HOST=localhost:8080 RUST_LOG=info cargo run --example gateway_events
//! ```

use std::sync::Arc;
use std::time::Duration;

use attensys_gateway_client::gateway::{
    Capabilities, Client, ConnectEvent, ErrorEvent, Handlers, Listener, SubscribeAck,
    SubscribeOptions,
};
use futures::StreamExt as _;
use tokio::time::timeout;
use tracing::{info, warn};

struct Logger;

impl Listener for Logger {
    fn capabilities(&self) -> Capabilities {
        Capabilities::CONNECT | Capabilities::SUBSCRIBE | Capabilities::ERROR
    }

    fn on_connect(&self, event: &ConnectEvent) {
        info!(server = %event.server, connected_at = %event.connected_at, "connected");
    }

    fn on_subscribe(&self, ack: &SubscribeAck) {
        info!(topic = %ack.topic, subscription_id = %ack.subscription_id, "subscribed");
    }

    fn on_error(&self, error: ErrorEvent<'_>) {
        warn!(?error, "gateway error");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = std::env::var("GATEWAY_HOST").unwrap_or_else(|_| "localhost:8080".to_owned());
    let client = Client::new(&host)?;
    client.add_listener(Arc::new(Logger));

    let state = client.connection_state();
    info!(address = %client.address(), state = ?state);

    let orders = client.subscribe(SubscribeOptions::new("orders"));
    orders.on(Handlers::new().on_message(|data| info!(stream = "orders", %data)));

    let prices = client.subscribe(
        SubscribeOptions::builder()
            .topic("prices")
            .query("symbol=BTC")
            .limit(5)
            .build(),
    );
    info!(topic = prices.topic(), "Subscribing to prices");

    timeout(Duration::from_secs(10), client.ensure_open()).await??;
    info!(subscriptions = client.subscription_count(), open = client.is_open());

    let mut stream = Box::pin(prices.into_stream());
    let mut count = 0;
    while let Ok(Some(data)) = timeout(Duration::from_secs(5), stream.next()).await {
        info!(stream = "prices", %data);
        count += 1;
        if count >= 5 {
            break;
        }
    }
    info!(stream = "prices", received = count);

    client.close();
    Ok(())
}
