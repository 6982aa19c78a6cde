//! Wire envelope shared by both transports.
//!
//! Every pushed message is a JSON object
//! `{type, data, messageId, timestamp, connectionId}`. SSE additionally
//! wraps it as `id: <messageId>\nevent: <type>\ndata: <json>\n\n`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::ids::ConnectionId;

/// Message type carried in the envelope's `type` field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Sent once right after a session is created.
    Connected,
    Ping,
    Pong,
    /// Scenario payload.
    Data,
    /// Scenario-level counters, display only.
    Metrics,
    /// Anything else, e.g. a manual broadcast or a WebSocket reply.
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Data => "data",
            Self::Metrics => "metrics",
            Self::Custom(name) => name,
        }
    }

    /// Whether frames of this type count as payload throughput.
    ///
    /// Only `data` does. Control chatter, display-only `metrics`, manual
    /// broadcasts and replies to client requests are counted as frames only.
    pub fn carries_data(&self) -> bool {
        matches!(self, Self::Data)
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "data" => Self::Data,
            "metrics" => Self::Metrics,
            other => Self::Custom(other.to_owned()),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

/// One pushed message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
    /// The sender's sequence value after increment.
    pub message_id: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub connection_id: ConnectionId,
}

/// An envelope together with its serialized JSON body.
#[derive(Clone, Debug)]
pub struct Frame {
    pub envelope: Envelope,
    pub json: String,
}

impl Frame {
    pub fn new(envelope: Envelope) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(&envelope)?;
        Ok(Self { envelope, json })
    }

    /// Serialized JSON length in bytes. This is what throughput metrics count.
    pub fn len(&self) -> usize {
        self.json.len()
    }

    pub fn is_empty(&self) -> bool {
        self.json.is_empty()
    }

    pub fn event_type(&self) -> &EventType {
        &self.envelope.event_type
    }

    pub fn message_id(&self) -> u64 {
        self.envelope.message_id
    }

    /// Render as a complete SSE event block.
    pub fn to_sse(&self) -> String {
        format!(
            "id: {}\nevent: {}\ndata: {}\n\n",
            self.envelope.message_id, self.envelope.event_type, self.json
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(event_type: EventType) -> Envelope {
        Envelope {
            event_type,
            data: json!({"x": 1}),
            message_id: 7,
            timestamp: 1_700_000_000_000,
            connection_id: ConnectionId::from_raw("conn_1"),
        }
    }

    #[test]
    fn envelope_field_names() {
        let value = serde_json::to_value(sample(EventType::Data)).unwrap();
        assert_eq!(value["type"], "data");
        assert_eq!(value["data"]["x"], 1);
        assert_eq!(value["messageId"], 7);
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["connectionId"], "conn_1");
    }

    #[test]
    fn sse_framing() {
        let frame = Frame::new(sample(EventType::Data)).unwrap();
        let text = frame.to_sse();
        assert!(text.starts_with("id: 7\nevent: data\ndata: {"));
        assert!(text.ends_with("}\n\n"));
        assert_eq!(text, format!("id: 7\nevent: data\ndata: {}\n\n", frame.json));
    }

    #[test]
    fn frame_len_is_json_bytes() {
        let frame = Frame::new(sample(EventType::Ping)).unwrap();
        assert_eq!(frame.len(), serde_json::to_string(&frame.envelope).unwrap().len());
    }

    #[test]
    fn event_type_parse() {
        assert_eq!(EventType::from("ping"), EventType::Ping);
        assert_eq!(EventType::from("data"), EventType::Data);
        assert_eq!(EventType::from("message"), EventType::Custom("message".into()));
        assert_eq!(EventType::from("message").as_str(), "message");
    }

    #[test]
    fn control_types_do_not_carry_data() {
        assert!(!EventType::Connected.carries_data());
        assert!(!EventType::Ping.carries_data());
        assert!(!EventType::Pong.carries_data());
        assert!(!EventType::Metrics.carries_data());
        assert!(EventType::Data.carries_data());
        assert!(!EventType::from("message").carries_data());
        assert!(!EventType::from("data_response").carries_data());
        assert!(!EventType::from("performance_response").carries_data());
    }

    #[test]
    fn custom_type_serializes_as_name() {
        let frame = Frame::new(sample(EventType::from("performance_response"))).unwrap();
        assert!(frame.json.contains("\"type\":\"performance_response\""));
    }
}
