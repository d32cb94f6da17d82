//! Canonical streaming events.
//!
//! Every provider transport the gateway speaks — native SDK streams,
//! OpenAI-compatible delta streams, raw SSE, long-poll operations — is
//! normalized into [`CanonicalEvent`] before it reaches the caller.
//!
//! A well-formed stream is zero or more content events (`text_delta`,
//! `tool_call`, `grounding_refs`) followed by exactly one `status` event.
//! The terminal event is the only place failure is visible: nothing else
//! escapes the stream.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// CanonicalEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted by the gateway during one streamed turn.
///
/// These are transient (never persisted) and drive real-time rendering as
/// the backend generates content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CanonicalEvent {
    /// Incremental text content.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// Text fragment, delivered in production order.
        text: String,
    },

    /// A reassembled function/tool call.
    #[serde(rename = "tool_call")]
    ToolCall {
        /// Provider-issued or synthesized call ID.
        call_id: String,
        /// Function name. Absent only for malformed upstream calls.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Argument JSON for the call. Carries the full reassembled
        /// argument string once the accumulator closes the call.
        #[serde(skip_serializing_if = "Option::is_none")]
        argument_fragment: Option<String>,
    },

    /// Web-grounding citations attached to the response.
    #[serde(rename = "grounding_refs")]
    GroundingRefs {
        /// Source URIs, in the order the provider reported them.
        refs: Vec<GroundingRef>,
    },

    /// Terminal marker. Exactly one per stream, on every path.
    #[serde(rename = "status")]
    Status {
        /// Provider that served (or failed to serve) the turn.
        provider: String,
        /// Model the turn was addressed to.
        model: String,
        /// Wall-clock latency from dispatch to termination.
        latency_ms: u64,
        /// Whether the turn completed or failed.
        outcome: StatusOutcome,
        /// Human-readable failure description when `outcome` is `error`.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl CanonicalEvent {
    /// Build a `text_delta` event.
    #[must_use]
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    /// Build a `tool_call` event from a completed invocation.
    #[must_use]
    pub fn tool_call(invocation: ToolInvocation) -> Self {
        Self::ToolCall {
            call_id: invocation.call_id,
            name: Some(invocation.name),
            argument_fragment: Some(invocation.arguments),
        }
    }

    /// Build a successful terminal `status` event.
    #[must_use]
    pub fn success(provider: impl Into<String>, model: impl Into<String>, latency_ms: u64) -> Self {
        Self::Status {
            provider: provider.into(),
            model: model.into(),
            latency_ms,
            outcome: StatusOutcome::Success,
            message: None,
        }
    }

    /// Build a failed terminal `status` event.
    #[must_use]
    pub fn failure(
        provider: impl Into<String>,
        model: impl Into<String>,
        latency_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::Status {
            provider: provider.into(),
            model: model.into(),
            latency_ms,
            outcome: StatusOutcome::Error,
            message: Some(message.into()),
        }
    }

    /// Whether this is the terminal `status` event.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

/// Outcome carried by the terminal `status` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusOutcome {
    /// The turn streamed to completion.
    Success,
    /// The turn failed; `message` describes why.
    Error,
}

impl StatusOutcome {
    /// Whether the outcome is [`StatusOutcome::Success`].
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supporting payloads
// ─────────────────────────────────────────────────────────────────────────────

/// One web-grounding citation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingRef {
    /// Source URI.
    pub uri: String,
}

impl GroundingRef {
    /// Build a reference from a URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// A completed, reassembled function call.
///
/// Produced by the tool-call accumulator once all fragments for one call
/// have arrived; carried to callers inside [`CanonicalEvent::ToolCall`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-issued or synthesized call ID.
    pub call_id: String,
    /// Function name.
    pub name: String,
    /// Full argument JSON, concatenated in fragment arrival order.
    pub arguments: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── serialization shapes ──

    #[test]
    fn text_delta_serializes_with_tag() {
        let event = CanonicalEvent::text_delta("hello");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "text_delta", "text": "hello"}));
    }

    #[test]
    fn tool_call_omits_absent_fields() {
        let event = CanonicalEvent::ToolCall {
            call_id: "call_ab12_0".into(),
            name: None,
            argument_fragment: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "tool_call", "call_id": "call_ab12_0"}));
    }

    #[test]
    fn tool_call_from_invocation_carries_all_fields() {
        let event = CanonicalEvent::tool_call(ToolInvocation {
            call_id: "call_1".into(),
            name: "create_note".into(),
            arguments: "{\"title\":\"x\"}".into(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tool_call",
                "call_id": "call_1",
                "name": "create_note",
                "argument_fragment": "{\"title\":\"x\"}",
            })
        );
    }

    #[test]
    fn grounding_refs_serialize_in_order() {
        let event = CanonicalEvent::GroundingRefs {
            refs: vec![
                GroundingRef::new("https://a.example"),
                GroundingRef::new("https://b.example"),
            ],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "grounding_refs",
                "refs": [{"uri": "https://a.example"}, {"uri": "https://b.example"}],
            })
        );
    }

    #[test]
    fn success_status_omits_message() {
        let event = CanonicalEvent::success("gemini", "gemini-2.5-flash", 412);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "status",
                "provider": "gemini",
                "model": "gemini-2.5-flash",
                "latency_ms": 412,
                "outcome": "success",
            })
        );
    }

    #[test]
    fn error_status_carries_message() {
        let event = CanonicalEvent::failure("groq", "llama-3.3-70b", 87, "connection refused");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["outcome"], "error");
        assert_eq!(value["message"], "connection refused");
    }

    // ── round trips ──

    #[test]
    fn events_round_trip() {
        let events = vec![
            CanonicalEvent::text_delta("chunk"),
            CanonicalEvent::ToolCall {
                call_id: "call_9".into(),
                name: Some("f".into()),
                argument_fragment: Some("{}".into()),
            },
            CanonicalEvent::GroundingRefs {
                refs: vec![GroundingRef::new("https://c.example")],
            },
            CanonicalEvent::success("mistral", "mistral-large", 1),
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: CanonicalEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn unknown_tag_fails_to_deserialize() {
        let result = serde_json::from_str::<CanonicalEvent>(r#"{"type":"telemetry"}"#);
        assert!(result.is_err());
    }

    // ── helpers ──

    #[test]
    fn only_status_is_terminal() {
        assert!(CanonicalEvent::success("p", "m", 0).is_terminal());
        assert!(CanonicalEvent::failure("p", "m", 0, "boom").is_terminal());
        assert!(!CanonicalEvent::text_delta("x").is_terminal());
    }

    #[test]
    fn outcome_strings_match_wire_contract() {
        assert_eq!(serde_json::to_value(StatusOutcome::Success).unwrap(), json!("success"));
        assert_eq!(serde_json::to_value(StatusOutcome::Error).unwrap(), json!("error"));
        assert!(StatusOutcome::Success.is_success());
        assert!(!StatusOutcome::Error.is_success());
    }
}
