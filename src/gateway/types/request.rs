#![expect(
    clippy::module_name_repetitions,
    reason = "Request types include the module name to mirror the wire frames they build"
)]

use bon::Builder;
use serde::Serialize;
use serde_with::skip_serializing_none;

/// Options accepted by [`crate::gateway::Client::subscribe`].
///
/// # Example
///
/// ```
/// use attensys_gateway_client::gateway::SubscribeOptions;
///
/// let options = SubscribeOptions::builder()
///     .topic("prices")
///     .query("symbol=BTC")
///     .limit(10)
///     .build();
///
/// assert_eq!(options.effective_topic(), "prices?symbol=BTC");
/// ```
#[non_exhaustive]
#[derive(Clone, Debug, Default, Builder)]
pub struct SubscribeOptions {
    /// Topic name; empty when not given
    #[builder(default, into)]
    pub topic: String,
    /// Maximum number of results; unset means no limit
    pub limit: Option<u64>,
    /// Query appended to the topic as `topic?query`
    #[builder(into)]
    pub query: Option<String>,
}

impl SubscribeOptions {
    /// Subscribe to `topic` without query or limit.
    #[must_use]
    pub fn new<S: Into<String>>(topic: S) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// The topic string sent to, and acknowledged by, the gateway.
    ///
    /// An empty query is treated as absent.
    #[must_use]
    pub fn effective_topic(&self) -> String {
        match self.query.as_deref() {
            Some(query) if !query.is_empty() => format!("{}?{query}", self.topic),
            _ => self.topic.clone(),
        }
    }

    /// Build the wire request for these options.
    #[must_use]
    pub fn to_request(&self) -> ClientMessage {
        ClientMessage::Subscribe(SubscribeRequest {
            topic: self.effective_topic(),
            limit: self.limit,
        })
    }
}

/// Frames sent from the client to the gateway.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Request events for a topic
    Subscribe(SubscribeRequest),
}

/// Body of a `subscribe` frame.
#[non_exhaustive]
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize)]
pub struct SubscribeRequest {
    /// Effective topic, including any `?query` suffix
    pub topic: String,
    /// Result limit; omitted from the frame when unset
    pub limit: Option<u64>,
}
