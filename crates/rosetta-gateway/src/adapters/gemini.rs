//! SDK-native transport for the Gemini API.
//!
//! Speaks `models/{model}:streamGenerateContent?alt=sse` with the API key
//! in the `x-goog-api-key` header. Function calls arrive whole (name plus
//! fully-formed `args` object in one part), so every tool-call fragment
//! this adapter emits is already complete. Grounding citations ride in
//! `groundingMetadata.groundingChunks` alongside the content parts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rosetta_core::{GroundingRef, Role};

use crate::api_error::provider_error;
use crate::error::GatewayResult;
use crate::registry::{ProviderDescriptor, TransportKind};

use super::pipeline::{eventsource_payloads, payloads_to_events};
use super::{
    AdapterRequest, RawEventStream, RawProviderEvent, ToolCallFragment, TransportAdapter,
};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes (request)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StreamGenerateRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolConfig>>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineBlob,
    },
}

#[derive(Serialize)]
struct InlineBlob {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct ToolConfig {
    #[serde(rename = "functionDeclarations", skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<FunctionDecl>>,
    #[serde(rename = "googleSearch", skip_serializing_if = "Option::is_none")]
    google_search: Option<GoogleSearch>,
}

#[derive(Serialize)]
struct FunctionDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct GoogleSearch {}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes (response)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StreamChunk {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ChunkPart>>,
}

#[derive(Deserialize)]
struct ChunkPart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCallPayload>,
}

#[derive(Deserialize)]
struct FunctionCallPayload {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks")]
    grounding_chunks: Option<Vec<GroundingChunkEntry>>,
}

#[derive(Deserialize)]
struct GroundingChunkEntry {
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    uri: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Build the wire request body.
fn build_body(request: &AdapterRequest) -> StreamGenerateRequest {
    let system_instruction = request.system_instruction.as_ref().map(|text| {
        SystemInstruction {
            parts: vec![RequestPart::Text { text: text.clone() }],
        }
    });

    let contents = request
        .turns
        .iter()
        .filter_map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let mut parts = Vec::new();
            if !turn.content.is_empty() {
                parts.push(RequestPart::Text {
                    text: turn.content.clone(),
                });
            }
            if let Some(payload) = &turn.payload {
                parts.push(RequestPart::Inline {
                    inline_data: InlineBlob {
                        mime_type: payload.mime_type.clone(),
                        data: payload.data.clone(),
                    },
                });
            }
            if parts.is_empty() {
                None
            } else {
                Some(Content {
                    role: role.into(),
                    parts,
                })
            }
        })
        .collect();

    let function_declarations = if request.tools.is_empty() {
        None
    } else {
        Some(
            request
                .tools
                .iter()
                .map(|tool| {
                    let schema = serde_json::to_value(&tool.parameters).unwrap_or_default();
                    FunctionDecl {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: sanitize_schema(&schema),
                    }
                })
                .collect(),
        )
    };

    let tools = if function_declarations.is_none() && !request.grounding {
        None
    } else {
        Some(vec![ToolConfig {
            function_declarations,
            google_search: request.grounding.then(|| GoogleSearch {}),
        }])
    };

    StreamGenerateRequest {
        system_instruction,
        contents,
        tools,
    }
}

/// Strip schema properties the Gemini API rejects (`additionalProperties`,
/// `$schema`), recursively.
fn sanitize_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => {
            let mut cleaned = serde_json::Map::new();
            for (key, value) in map {
                if key == "additionalProperties" || key == "$schema" {
                    continue;
                }
                let _ = cleaned.insert(key.clone(), sanitize_schema(value));
            }
            serde_json::Value::Object(cleaned)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sanitize_schema).collect())
        }
        other => other.clone(),
    }
}

/// Translate one stream chunk into raw events.
fn chunk_events(chunk: &StreamChunk) -> Vec<RawProviderEvent> {
    let mut events = Vec::new();

    let Some(candidates) = &chunk.candidates else {
        return events;
    };
    let Some(candidate) = candidates.first() else {
        return events;
    };

    if let Some(content) = &candidate.content {
        for part in content.parts.iter().flatten() {
            if let Some(text) = &part.text {
                if !text.is_empty() {
                    events.push(RawProviderEvent::TextDelta(text.clone()));
                }
            }
            if let Some(call) = &part.function_call {
                let arguments = call.args.as_ref().map_or_else(
                    || "{}".to_string(),
                    |args| serde_json::to_string(args).unwrap_or_else(|_| "{}".into()),
                );
                events.push(RawProviderEvent::ToolCall(ToolCallFragment {
                    name: Some(call.name.clone()),
                    argument_fragment: Some(arguments),
                    complete: true,
                    ..ToolCallFragment::default()
                }));
            }
        }
    }

    if let Some(metadata) = &candidate.grounding_metadata {
        let refs: Vec<GroundingRef> = metadata
            .grounding_chunks
            .iter()
            .flatten()
            .filter_map(|entry| entry.web.as_ref().and_then(|web| web.uri.clone()))
            .map(GroundingRef::new)
            .collect();
        if !refs.is_empty() {
            events.push(RawProviderEvent::GroundingRefs(refs));
        }
    }

    events
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Adapter for the SDK-native transport.
pub struct GeminiAdapter {
    client: reqwest::Client,
}

impl GeminiAdapter {
    /// Create an adapter sharing the given HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportAdapter for GeminiAdapter {
    fn transport(&self) -> TransportKind {
        TransportKind::SdkNative
    }

    async fn open(
        &self,
        descriptor: &ProviderDescriptor,
        credential: &str,
        request: &AdapterRequest,
    ) -> GatewayResult<RawEventStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            descriptor.base_endpoint, request.model
        );
        let body = build_body(request);

        debug!(
            model = %request.model,
            turn_count = request.turns.len(),
            tool_count = request.tools.len(),
            grounding = request.grounding,
            "opening Gemini stream"
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, credential)
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
            |chunk: &StreamChunk, _: &mut ()| chunk_events(chunk),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
