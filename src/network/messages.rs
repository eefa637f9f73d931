//! Frames exchanged over the live channel.
//!
//! Every frame is a JSON object discriminated by `type`. Payload fields are
//! expected at the top level; frames that nest them under `data` are
//! flattened by [`decode_frame`] first.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{de_opt_id, ExecutionRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    ChatMessage(ChatMessage),
    ExecutionUpdate(ExecutionRecord),
    AgentThought(AgentThought),
    ConnectionEstablished {
        #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    Error {
        #[serde(default, alias = "error")]
        message: String,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Any frame type this client does not know. Ignored.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "role")]
    pub sender: String,
    #[serde(default, alias = "message")]
    pub content: String,
    /// Unix milliseconds. Zero when the server sent none; the receiver
    /// stamps it on arrival.
    #[serde(default, deserialize_with = "de_timestamp_ms")]
    pub timestamp: i64,
    /// Human-in-the-Loop prompt awaiting an operator answer.
    #[serde(default, alias = "is_hitl")]
    pub hitl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: None,
            sender: sender.into(),
            content: content.into(),
            timestamp,
            hitl: false,
            conversation_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentThought {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_id")]
    pub execution_id: Option<String>,
    #[serde(default, alias = "content")]
    pub thought: String,
    #[serde(default, deserialize_with = "de_timestamp_ms")]
    pub timestamp: i64,
}

/// Accepts unix seconds, unix milliseconds or an RFC 3339 string.
fn de_timestamp_ms<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => match n.as_f64() {
            // Anything below ~1973 in milliseconds is a seconds value.
            Some(v) if v.abs() < 1e11 => (v * 1000.0) as i64,
            Some(v) => v as i64,
            None => 0,
        },
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0),
        _ => 0,
    })
}

/// Parse one text frame. Returns `None` (after logging) for anything that is
/// not a JSON object with a string `type`.
pub fn decode_frame(text: &str) -> Option<WsMessage> {
    let mut value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Failed to parse live frame as JSON: {}", e);
            return None;
        }
    };

    let obj = match value.as_object_mut() {
        Some(obj) if obj.get("type").map_or(false, Value::is_string) => obj,
        _ => {
            log::warn!("Dropping live frame without a type: {}", text);
            return None;
        }
    };

    if let Some(Value::Object(data)) = obj.remove("data") {
        for (key, field) in data {
            obj.entry(key).or_insert(field);
        }
    }

    match serde_json::from_value(value) {
        Ok(frame) => Some(frame),
        Err(e) => {
            log::warn!("Dropping malformed live frame: {}", e);
            None
        }
    }
}

pub fn encode_frame(frame: &WsMessage) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionStatus;

    #[test]
    fn known_types_decode() {
        let chat = decode_frame(
            r#"{"type":"chat_message","sender":"agent","content":"hi","timestamp":1700000000000}"#,
        );
        assert_eq!(
            chat,
            Some(WsMessage::ChatMessage(ChatMessage::new("agent", "hi", 1_700_000_000_000)))
        );

        let update = decode_frame(
            r#"{"type":"execution_update","data":{"execution_id":5,"status":"running","progress":40}}"#,
        );
        match update {
            Some(WsMessage::ExecutionUpdate(record)) => {
                assert_eq!(record.execution_id, "5");
                assert_eq!(record.status, ExecutionStatus::Running);
                assert_eq!(record.progress, 40.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_types_decode_to_unknown() {
        assert_eq!(
            decode_frame(r#"{"type":"presence","who":"x"}"#),
            Some(WsMessage::Unknown)
        );
        assert_eq!(decode_frame(r#"{"no_type":true}"#), None);
        assert_eq!(decode_frame("garbage"), None);
    }

    #[test]
    fn timestamps_accept_seconds_and_strings() {
        let thought = decode_frame(
            r#"{"type":"agent_thought","agent_id":3,"content":"thinking","timestamp":1700000000}"#,
        );
        match thought {
            Some(WsMessage::AgentThought(t)) => {
                assert_eq!(t.agent_id.as_deref(), Some("3"));
                assert_eq!(t.thought, "thinking");
                assert_eq!(t.timestamp, 1_700_000_000_000);
            }
            other => panic!("unexpected {:?}", other),
        }

        let chat = decode_frame(
            r#"{"type":"chat_message","sender":"a","content":"b","timestamp":"2024-01-01T00:00:00Z","is_hitl":true}"#,
        );
        match chat {
            Some(WsMessage::ChatMessage(m)) => {
                assert_eq!(m.timestamp, 1_704_067_200_000);
                assert!(m.hitl);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pong_encodes_with_type_only() {
        let text = encode_frame(&WsMessage::Pong { timestamp: None }).unwrap();
        assert_eq!(text, r#"{"type":"pong"}"#);
    }
}
