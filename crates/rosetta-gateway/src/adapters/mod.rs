//! Transport adapters.
//!
//! One adapter per transport kind, all implementing the same contract:
//! [`TransportAdapter::open`] takes a provider descriptor, a credential,
//! and a shaped request, and returns a lazy pull-driven stream of
//! [`RawProviderEvent`]s. Dropping the stream closes the underlying
//! connection (or aborts the poll loop) with no further side effects.
//!
//! Adapters only translate: provider-native wire shapes live as private
//! structs inside each adapter module and never leak past it. Fragment
//! reassembly, history, and terminal-event bookkeeping belong to the
//! sequencer layer above.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use rosetta_core::{ConversationTurn, GroundingRef, ToolDeclaration};

use crate::error::GatewayResult;
use crate::registry::{ProviderDescriptor, TransportKind};

pub mod gemini;
pub mod longpoll;
pub mod openai_compat;
mod pipeline;
pub mod raw_sse;

pub use gemini::GeminiAdapter;
pub use longpoll::{LongPollAdapter, LongPollConfig};
pub use openai_compat::OpenAiCompatAdapter;
pub use raw_sse::RawSseAdapter;

// ─────────────────────────────────────────────────────────────────────────────
// Raw events
// ─────────────────────────────────────────────────────────────────────────────

/// One fragment of a streamed function call, as the wire delivered it.
///
/// OpenAI-style transports key fragments by array `index` and send
/// `call_id`/`name` only on the first fragment of a call; the SDK-native
/// transport sends whole calls (no index, no id, `complete` set).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    /// Wire position of the call within the response, when the transport
    /// provides one.
    pub index: Option<u32>,
    /// Provider-issued call id, when the transport provides one.
    pub call_id: Option<String>,
    /// Function name; may arrive before the arguments are complete.
    pub name: Option<String>,
    /// Partial argument JSON, to be concatenated in arrival order.
    pub argument_fragment: Option<String>,
    /// Whether the transport knows the call is already complete.
    pub complete: bool,
}

/// Events produced by a transport adapter, before canonicalization.
#[derive(Clone, Debug, PartialEq)]
pub enum RawProviderEvent {
    /// Incremental text content.
    TextDelta(String),
    /// One tool-call fragment.
    ToolCall(ToolCallFragment),
    /// Web-grounding citations.
    GroundingRefs(Vec<GroundingRef>),
}

/// Boxed stream of raw events returned by [`TransportAdapter::open`].
pub type RawEventStream = Pin<Box<dyn Stream<Item = GatewayResult<RawProviderEvent>> + Send>>;

// ─────────────────────────────────────────────────────────────────────────────
// Request shape
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic request an adapter turns into its wire format.
///
/// Built by the sequencer: `turns` is the history window plus the current
/// user turn, and `tools`/`grounding` are already gated by the provider's
/// capabilities.
#[derive(Clone, Debug, Default)]
pub struct AdapterRequest {
    /// Model id, already stripped of any routing prefix the provider
    /// should not see.
    pub model: String,
    /// Opaque system instruction, forwarded verbatim.
    pub system_instruction: Option<String>,
    /// Conversation turns, oldest first, ending with the current user turn.
    pub turns: Vec<ConversationTurn>,
    /// Tool declarations to offer (empty when the provider lacks tools).
    pub tools: Vec<ToolDeclaration>,
    /// Whether to request web grounding (only set for capable providers).
    pub grounding: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter contract
// ─────────────────────────────────────────────────────────────────────────────

/// Common contract every transport adapter implements.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Transport kind this adapter serves.
    fn transport(&self) -> TransportKind;

    /// Open a stream against the provider.
    ///
    /// Returns an error for failures before any event is produced (bad
    /// request construction, connection refused, non-success HTTP status).
    /// Failures after the stream is open surface as `Err` items inside the
    /// stream itself.
    async fn open(
        &self,
        descriptor: &ProviderDescriptor,
        credential: &str,
        request: &AdapterRequest,
    ) -> GatewayResult<RawEventStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_trait_is_object_safe() {
        fn assert_object_safe(_: &dyn TransportAdapter) {}
        let _ = assert_object_safe;
    }

    #[test]
    fn adapter_trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn TransportAdapter>();
    }

    #[test]
    fn fragment_default_is_an_empty_continuation() {
        let fragment = ToolCallFragment::default();
        assert!(fragment.index.is_none());
        assert!(fragment.call_id.is_none());
        assert!(fragment.name.is_none());
        assert!(fragment.argument_fragment.is_none());
        assert!(!fragment.complete);
    }
}
