//! Outgoing chat message rewriting.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

/// Part type the gateway rejects when echoed back in history.
pub const REASONING_PART: &str = "reasoning";

/// A chat message as the host hands it over. Only `parts` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MessagePart {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn is_reasoning(&self) -> bool {
        self.kind == REASONING_PART
    }
}

/// Drop every reasoning part, keeping the order of everything else.
pub fn strip_reasoning(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .map(|mut message| {
            if let Some(parts) = message.parts.as_mut() {
                parts.retain(|part| !part.is_reasoning());
            }
            message
        })
        .collect()
}
