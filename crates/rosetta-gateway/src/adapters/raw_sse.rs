//! Raw-SSE transport for OpenRouter.
//!
//! Speaks the same chat-completions dialect as [`openai_compat`], but the
//! response bytes are framed by the in-crate decoder instead of
//! `eventsource-stream`: OpenRouter interleaves `: OPENROUTER PROCESSING`
//! comment keep-alives and occasionally splits frames mid-line, and the
//! decoder owns exactly that reassembly. Requests also carry OpenRouter's
//! attribution headers.

use async_trait::async_trait;
use tracing::debug;

use crate::api_error::provider_error;
use crate::error::GatewayResult;
use crate::registry::{ProviderDescriptor, TransportKind};
use crate::sse::decode_data_lines;

use super::openai_compat::{ChatChunk, build_body, delta_events};
use super::pipeline::payloads_to_events;
use super::{AdapterRequest, RawEventStream, TransportAdapter};

/// Attribution headers OpenRouter uses for app rankings.
const REFERER_HEADER: &str = "HTTP-Referer";
const TITLE_HEADER: &str = "X-Title";

const ATTRIBUTION_REFERER: &str = "https://github.com/moose/rosetta";
const ATTRIBUTION_TITLE: &str = "rosetta";

/// Adapter for the raw-SSE transport.
pub struct RawSseAdapter {
    client: reqwest::Client,
}

impl RawSseAdapter {
    /// Create an adapter sharing the given HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportAdapter for RawSseAdapter {
    fn transport(&self) -> TransportKind {
        TransportKind::RawSse
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
            "opening raw SSE stream"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .header(REFERER_HEADER, ATTRIBUTION_REFERER)
            .header(TITLE_HEADER, ATTRIBUTION_TITLE)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(provider_error(status.as_u16(), &body_text));
        }

        Ok(payloads_to_events(
            decode_data_lines(response.bytes_stream()),
            (),
            |chunk: &ChatChunk, _: &mut ()| delta_events(chunk),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
