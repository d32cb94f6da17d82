//! Shared plumbing for the SSE-speaking transports.
//!
//! Three of the four transports follow the same pipeline: frame the
//! response bytes into `data:` payloads, deserialize each payload, hand
//! it to a per-transport translator, flatten, box. These helpers hold
//! that pipeline in one place; only the framing step and the translator
//! differ per adapter.

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};

use super::{RawEventStream, RawProviderEvent};

/// Frame a byte stream into SSE `data:` payloads with `eventsource-stream`.
///
/// Ends the stream at the `[DONE]` sentinel used by chat-completions
/// providers; providers that never send it are unaffected. Read failures
/// surface as a single `Err` item.
pub(crate) fn eventsource_payloads<S, E>(
    byte_stream: S,
) -> impl Stream<Item = GatewayResult<String>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    byte_stream
        .eventsource()
        .map(|item| match item {
            Ok(event) => Ok(event.data),
            Err(e) => Err(GatewayError::Transport {
                message: format!("event stream failed: {e}"),
            }),
        })
        .take_while(|item| {
            std::future::ready(!matches!(item, Ok(data) if data == "[DONE]"))
        })
}

/// Deserialize framed payloads and translate them into raw events.
///
/// Payloads that fail to parse are logged and skipped; the providers
/// occasionally interleave keep-alive or vendor-specific lines that are
/// not part of the streamed body. `Err` items pass straight through and
/// the translator never sees them.
pub(crate) fn payloads_to_events<P, E, S, H>(
    payloads: P,
    initial_state: S,
    mut translate: H,
) -> RawEventStream
where
    P: Stream<Item = GatewayResult<String>> + Send + 'static,
    E: DeserializeOwned + Send + 'static,
    S: Send + 'static,
    H: FnMut(&E, &mut S) -> Vec<RawProviderEvent> + Send + 'static,
{
    let event_stream = payloads
        .scan(initial_state, move |state, item| {
            let out: Vec<GatewayResult<RawProviderEvent>> = match item {
                Ok(payload) => match serde_json::from_str::<E>(&payload) {
                    Ok(parsed) => translate(&parsed, state).into_iter().map(Ok).collect(),
                    Err(e) => {
                        warn!(payload = %payload, error = %e, "skipping unparseable stream payload");
                        vec![]
                    }
                },
                Err(e) => vec![Err(e)],
            };
            std::future::ready(Some(out))
        })
        .flat_map(stream::iter);

    Box::pin(event_stream)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
