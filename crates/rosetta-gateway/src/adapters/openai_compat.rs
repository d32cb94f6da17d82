//! Chat-completions transport for OpenAI-compatible providers.
//!
//! Groq, Mistral, DeepSeek, OpenAI, and xAI all speak this dialect:
//! `POST {base}/chat/completions` with a Bearer credential, `stream: true`,
//! SSE frames carrying `choices[0].delta`, and a `[DONE]` sentinel to
//! finish. Tool calls stream as fragments keyed by array `index`, with
//! `id` and `function.name` only on the first fragment of each call.
//!
//! The wire shapes and translators are `pub(crate)`: the raw-SSE transport
//! speaks the same dialect over its own framing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rosetta_core::Role;

use crate::api_error::provider_error;
use crate::error::GatewayResult;
use crate::registry::{ProviderDescriptor, TransportKind};

use super::pipeline::{eventsource_payloads, payloads_to_events};
use super::{
    AdapterRequest, RawEventStream, RawProviderEvent, ToolCallFragment, TransportAdapter,
};

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes (request)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageBody,
}

/// Plain string for text-only messages, content-part array when an image
/// rides along.
#[derive(Serialize)]
#[serde(untagged)]
enum MessageBody {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: String,
    function: FunctionSpec,
}

#[derive(Serialize)]
struct FunctionSpec {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes (response)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct ChatChunk {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    delta: Option<ChatDelta>,
}

#[derive(Deserialize)]
struct ChatDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    index: Option<u32>,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Build the wire request body.
pub(crate) fn build_body(request: &AdapterRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);

    if let Some(instruction) = &request.system_instruction {
        messages.push(ChatMessage {
            role: "system".into(),
            content: MessageBody::Text(instruction.clone()),
        });
    }

    for turn in &request.turns {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let content = match &turn.payload {
            Some(payload) => {
                let mut parts = Vec::new();
                if !turn.content.is_empty() {
                    parts.push(ContentPart::Text {
                        text: turn.content.clone(),
                    });
                }
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", payload.mime_type, payload.data),
                    },
                });
                MessageBody::Parts(parts)
            }
            None => MessageBody::Text(turn.content.clone()),
        };
        messages.push(ChatMessage {
            role: role.into(),
            content,
        });
    }

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(
            request
                .tools
                .iter()
                .map(|tool| ChatTool {
                    kind: "function".into(),
                    function: FunctionSpec {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: serde_json::to_value(&tool.parameters).unwrap_or_default(),
                    },
                })
                .collect(),
        )
    };

    ChatRequest {
        model: request.model.clone(),
        messages,
        stream: true,
        tools,
    }
}

/// Translate one streamed chunk into raw events.
pub(crate) fn delta_events(chunk: &ChatChunk) -> Vec<RawProviderEvent> {
    let mut events = Vec::new();

    let Some(choice) = chunk.choices.as_ref().and_then(|c| c.first()) else {
        return events;
    };
    let Some(delta) = &choice.delta else {
        return events;
    };

    if let Some(content) = &delta.content {
        if !content.is_empty() {
            events.push(RawProviderEvent::TextDelta(content.clone()));
        }
    }

    for call in delta.tool_calls.iter().flatten() {
        let fragment = ToolCallFragment {
            index: call.index,
            call_id: call.id.clone(),
            name: call.function.as_ref().and_then(|f| f.name.clone()),
            argument_fragment: call.function.as_ref().and_then(|f| f.arguments.clone()),
            complete: false,
        };
        if fragment != ToolCallFragment::default() {
            events.push(RawProviderEvent::ToolCall(fragment));
        }
    }

    events
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Adapter for the OpenAI-compatible transport.
pub struct OpenAiCompatAdapter {
    client: reqwest::Client,
}

impl OpenAiCompatAdapter {
    /// Create an adapter sharing the given HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportAdapter for OpenAiCompatAdapter {
    fn transport(&self) -> TransportKind {
        TransportKind::OpenAiCompatible
    }

    async fn open(
        &self,
        descriptor: &ProviderDescriptor,
        credential: &str,
        request: &AdapterRequest,
    ) -> GatewayResult<RawEventStream> {
        let url = format!("{}/chat/completions", descriptor.base_endpoint);
        let body = build_body(request);

        debug!(
            provider = %descriptor.id,
            model = %request.model,
            turn_count = request.turns.len(),
            tool_count = request.tools.len(),
            "opening chat-completions stream"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(provider_error(status.as_u16(), &body_text));
        }

        Ok(payloads_to_events(
            eventsource_payloads(response.bytes_stream()),
            (),
            |chunk: &ChatChunk, _: &mut ()| delta_events(chunk),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
