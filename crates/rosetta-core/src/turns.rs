//! Conversation turns.
//!
//! A turn is one utterance from one side of the conversation, optionally
//! carrying an inline binary payload (vision input). Turns are owned by the
//! history buffer that created them and re-injected as context into each
//! new call.

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human (or embedding application) side.
    User,
    /// The model side.
    Assistant,
}

/// Binary payload attached inline to a turn.
///
/// Base64 is the interchange form because every provider wire format the
/// gateway speaks accepts base64 inline data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePayload {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

impl InlinePayload {
    /// Build a payload from a MIME type and base64 data.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// One turn of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced the turn.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Optional inline binary payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<InlinePayload>,
}

impl ConversationTurn {
    /// Build a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            payload: None,
        }
    }

    /// Build an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            payload: None,
        }
    }

    /// Attach an inline payload to the turn.
    #[must_use]
    pub fn with_payload(mut self, payload: InlinePayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), json!("assistant"));
    }

    #[test]
    fn plain_turn_omits_payload() {
        let turn = ConversationTurn::user("hello");
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn payload_round_trips() {
        let turn = ConversationTurn::user("what is this?")
            .with_payload(InlinePayload::new("image/png", "aGVsbG8="));
        let json = serde_json::to_string(&turn).unwrap();
        let back: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
        assert_eq!(back.payload.unwrap().mime_type, "image/png");
    }
}
