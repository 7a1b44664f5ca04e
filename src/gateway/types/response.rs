use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::ws::WsError;

/// Top-level gateway message wrapper.
///
/// Every text frame received from the gateway is deserialized into this enum,
/// discriminated by its `type` field.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Confirms a subscribe request and assigns a subscription id
    #[serde(rename = "subscribe-ack")]
    SubscribeAck(SubscribeAck),
    /// Confirms an unsubscribe request
    #[serde(rename = "unsubscribe-ack")]
    UnsubscribeAck(UnsubscribeAck),
    /// An event published to a subscription
    #[serde(rename = "event")]
    Event(EventMessage),
    /// An error reported by the gateway
    #[serde(rename = "error")]
    Error(ServerError),
}

impl ServerMessage {
    /// The wire `type` of this message.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SubscribeAck(_) => "subscribe-ack",
            Self::UnsubscribeAck(_) => "unsubscribe-ack",
            Self::Event(_) => "event",
            Self::Error(_) => "error",
        }
    }
}

/// `subscribe-ack` frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribeAck {
    /// Effective topic the acknowledged request was made for
    pub topic: String,
    /// Identifier used by subsequent `event` frames
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    /// Any additional fields sent by the gateway
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `unsubscribe-ack` frame. The gateway does not define its fields.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UnsubscribeAck {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UnsubscribeAck {
    /// Look up a field of the acknowledgement.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// `event` frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventMessage {
    /// Subscription the event belongs to
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    /// Event payload, `null` when absent
    #[serde(default)]
    pub data: Value,
    /// Topic of the subscription, when the gateway includes it
    #[serde(default)]
    pub topic: Option<String>,
}

/// `error` frame. The gateway does not define its fields.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ServerError {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ServerError {
    /// The `message` field, if the gateway sent a string one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(Value::as_str)
    }
}

/// Deserialize a single gateway frame.
///
/// Fails with a [`crate::error::Kind::Protocol`] error when the text is not JSON,
/// has no `type`, or carries a `type` this client does not know.
pub fn parse_message(text: &str) -> crate::Result<ServerMessage> {
    serde_json::from_str(text).map_err(|e| Error::protocol(WsError::MessageParse(e)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Kind;

    #[test]
    fn parse_subscribe_ack() {
        let json = r#"{"type":"subscribe-ack","topic":"prices?symbol=BTC","subscriptionId":"S1"}"#;

        let ServerMessage::SubscribeAck(ack) = parse_message(json).unwrap() else {
            panic!("expected subscribe-ack");
        };
        assert_eq!(ack.topic, "prices?symbol=BTC");
        assert_eq!(ack.subscription_id, "S1");
        assert!(ack.extra.is_empty(), "type should not leak into extra fields");
    }

    #[test]
    fn parse_event_with_payload() {
        let json = r#"{"type":"event","subscriptionId":"S1","data":{"price":42},"topic":"prices"}"#;

        let ServerMessage::Event(event) = parse_message(json).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.subscription_id, "S1");
        assert_eq!(event.data, json!({ "price": 42 }));
        assert_eq!(event.topic.as_deref(), Some("prices"));
    }

    #[test]
    fn parse_event_without_data() {
        let json = r#"{"type":"event","subscriptionId":"S9"}"#;

        let ServerMessage::Event(event) = parse_message(json).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.data, Value::Null);
        assert!(event.topic.is_none());
    }

    #[test]
    fn parse_opaque_frames() {
        let unsubscribe = r#"{"type":"unsubscribe-ack","subscriptionId":"S1","topic":"prices"}"#;
        let ServerMessage::UnsubscribeAck(ack) = parse_message(unsubscribe).unwrap() else {
            panic!("expected unsubscribe-ack");
        };
        assert_eq!(ack.get("subscriptionId"), Some(&json!("S1")));

        let error = r#"{"type":"error","message":"unknown topic","code":404}"#;
        let ServerMessage::Error(error) = parse_message(error).unwrap() else {
            panic!("expected error");
        };
        assert_eq!(error.message(), Some("unknown topic"));
        assert_eq!(error.fields.get("code"), Some(&json!(404)));
    }

    #[test]
    fn unknown_type_is_protocol_error() {
        let error = parse_message(r#"{"type":"heartbeat"}"#).unwrap_err();
        assert_eq!(error.kind(), Kind::Protocol);
    }

    #[test]
    fn missing_type_is_protocol_error() {
        let error = parse_message(r#"{"topic":"prices"}"#).unwrap_err();
        assert_eq!(error.kind(), Kind::Protocol);
    }

    #[test]
    fn invalid_json_is_protocol_error() {
        let error = parse_message("not json").unwrap_err();
        assert_eq!(error.kind(), Kind::Protocol);
        assert!(matches!(
            error.downcast_ref::<WsError>(),
            Some(WsError::MessageParse(_))
        ));
    }

    #[test]
    fn ack_without_subscription_id_is_protocol_error() {
        let error = parse_message(r#"{"type":"subscribe-ack","topic":"prices"}"#).unwrap_err();
        assert_eq!(error.kind(), Kind::Protocol);
    }

    #[test]
    fn message_kind_matches_wire_type() {
        let message = parse_message(r#"{"type":"error"}"#).unwrap();
        assert_eq!(message.kind(), "error");
    }
}
