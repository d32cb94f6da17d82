//! Turn sequencing.
//!
//! The orchestration layer above the transport adapters. For each turn it
//! routes the model, acquires a credential, gates the request by provider
//! capabilities, opens the transport stream, and folds raw provider events
//! into the canonical contract: zero or more content events, then exactly
//! one terminal `status` event, on every path.
//!
//! Streams are lazy and abandonable. Nothing is dispatched until first
//! poll, and dropping a partially-consumed stream tears the provider
//! connection (or poll loop) down without touching history. History is
//! appended only after a fully successful turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use rosetta_core::{
    CanonicalEvent, ConversationTurn, GroundingRef, InlinePayload, StatusOutcome, ToolDeclaration,
    ToolInvocation,
};
use tracing::{debug, info, instrument, warn};

use crate::accumulator::ToolCallAccumulator;
use crate::adapters::{
    AdapterRequest, GeminiAdapter, LongPollAdapter, OpenAiCompatAdapter, RawProviderEvent,
    RawSseAdapter, TransportAdapter,
};
use crate::config::GatewayConfig;
use crate::credentials::CredentialStore;
use crate::error::{GatewayError, GatewayResult};
use crate::history::HistoryBuffer;
use crate::registry::{ProviderDescriptor, ProviderRegistry, TransportKind};

// ─────────────────────────────────────────────────────────────────────────────
// Request / outcome
// ─────────────────────────────────────────────────────────────────────────────

/// One caller request for one streamed turn.
#[derive(Clone, Debug, Default)]
pub struct TurnRequest {
    /// Conversation this turn belongs to; scopes the history window.
    pub conversation_id: String,
    /// Model id: a catalog id, or an explicit `provider/model` pair.
    pub model: String,
    /// Route to this provider id instead of consulting the catalog.
    pub provider_override: Option<String>,
    /// User message text.
    pub text: String,
    /// Inline binary payload (vision input). Dropped with a warning for
    /// providers without vision support.
    pub payload: Option<InlinePayload>,
    /// Tools offered to the model. Dropped with a warning for providers
    /// without tool support.
    pub tools: Vec<ToolDeclaration>,
    /// Opaque system instruction, forwarded verbatim.
    pub system_instruction: Option<String>,
    /// Request web grounding (honored only where the provider supports it).
    pub grounding: bool,
}

/// Aggregated result of a fully-driven turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    /// Concatenated text deltas, including any inline error marker.
    pub text: String,
    /// Completed tool invocations, in emission order.
    pub invocations: Vec<ToolInvocation>,
    /// Web-grounding citations, in emission order.
    pub grounding: Vec<GroundingRef>,
    /// Terminal outcome of the turn.
    pub outcome: StatusOutcome,
    /// Failure description when `outcome` is `error`.
    pub error: Option<String>,
}

impl TurnOutcome {
    /// Whether the turn completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// Multi-provider streaming gateway.
///
/// Owns the routing table, credential pools, transport adapters, and
/// per-conversation history. All methods take `&self`; share it behind an
/// `Arc` for concurrent turns.
pub struct Gateway {
    registry: ProviderRegistry,
    credentials: CredentialStore,
    config: GatewayConfig,
    adapters: HashMap<TransportKind, Arc<dyn TransportAdapter>>,
    sessions: DashMap<String, Arc<Mutex<HistoryBuffer>>>,
}

impl Gateway {
    /// Start building a gateway.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Serve one turn as a canonical event stream.
    ///
    /// The stream is lazy: nothing is routed or dispatched until first
    /// poll. Dropping it mid-turn abandons the provider stream and leaves
    /// history untouched. Every completion path ends with exactly one
    /// terminal `status` event.
    #[allow(clippy::too_many_lines)]
    pub fn stream_turn(
        &self,
        request: TurnRequest,
    ) -> impl Stream<Item = CanonicalEvent> + Send + '_ {
        stream! {
            let started = Instant::now();

            let (descriptor, model) = match self.route(&request) {
                Ok(route) => route,
                Err(error) => {
                    warn!(model = %request.model, error = %error, "turn routing failed");
                    let provider = request
                        .provider_override
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string());
                    yield error.into_status(provider, request.model.clone(), elapsed_ms(started));
                    return;
                }
            };
            let provider = descriptor.id.clone();

            let Some(credential) = self.credentials.acquire(&provider) else {
                let error = GatewayError::MissingCredential {
                    provider: provider.clone(),
                };
                warn!(provider = %provider, model = %model, "turn failed before dispatch");
                yield error.into_status(provider, model, elapsed_ms(started));
                return;
            };

            let Some(adapter) = self.adapters.get(&descriptor.transport) else {
                let error = GatewayError::Transport {
                    message: format!(
                        "no adapter installed for transport {:?}",
                        descriptor.transport
                    ),
                };
                warn!(provider = %provider, model = %model, error = %error, "turn failed before dispatch");
                yield error.into_status(provider, model, elapsed_ms(started));
                return;
            };

            let history = self.session(&request.conversation_id);

            let mut user_turn = ConversationTurn::user(request.text);
            if let Some(payload) = request.payload {
                if descriptor.capabilities.vision {
                    user_turn = user_turn.with_payload(payload);
                } else {
                    warn!(provider = %provider, "dropping inline payload: provider lacks vision");
                }
            }
            let tools = if descriptor.capabilities.tools || request.tools.is_empty() {
                request.tools
            } else {
                warn!(
                    provider = %provider,
                    dropped = request.tools.len(),
                    "dropping tool declarations: provider lacks tool support"
                );
                Vec::new()
            };
            let grounding = request.grounding && descriptor.capabilities.grounding;
            if request.grounding && !grounding {
                debug!(provider = %provider, "grounding request ignored: provider lacks grounding");
            }

            let mut turns = history.lock().snapshot();
            turns.push(user_turn.clone());
            let adapter_request = AdapterRequest {
                model: model.clone(),
                system_instruction: request.system_instruction,
                turns,
                tools,
                grounding,
            };

            debug!(provider = %provider, model = %model, transport = ?descriptor.transport, "dispatching turn");
            let mut stream = match adapter.open(descriptor, &credential, &adapter_request).await {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(
                        provider = %provider,
                        model = %model,
                        category = error.category(),
                        error = %error,
                        "provider stream failed to open"
                    );
                    yield CanonicalEvent::text_delta(inline_error_marker(&provider, &error));
                    yield error.into_status(provider, model, elapsed_ms(started));
                    return;
                }
            };

            let mut accumulator = ToolCallAccumulator::new();
            let mut collected = String::new();
            let mut delivered = false;
            let mut failure = None;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(RawProviderEvent::TextDelta(text)) => {
                        collected.push_str(&text);
                        delivered = true;
                        yield CanonicalEvent::text_delta(text);
                    }
                    Ok(RawProviderEvent::ToolCall(fragment)) => {
                        for invocation in accumulator.absorb(fragment) {
                            delivered = true;
                            yield CanonicalEvent::tool_call(invocation);
                        }
                    }
                    Ok(RawProviderEvent::GroundingRefs(refs)) => {
                        delivered = true;
                        yield CanonicalEvent::GroundingRefs { refs };
                    }
                    Err(error) => {
                        failure = Some(error);
                        break;
                    }
                }
            }

            match failure {
                None => {
                    if let Some(invocation) = accumulator.finish() {
                        yield CanonicalEvent::tool_call(invocation);
                    }
                    let latency_ms = elapsed_ms(started);
                    history
                        .lock()
                        .push_exchange(user_turn, ConversationTurn::assistant(collected));
                    info!(
                        conversation = %request.conversation_id,
                        provider = %provider,
                        model = %model,
                        latency_ms,
                        "turn completed"
                    );
                    yield CanonicalEvent::success(provider, model, latency_ms);
                }
                Some(error) => {
                    warn!(
                        provider = %provider,
                        model = %model,
                        category = error.category(),
                        error = %error,
                        "provider stream failed"
                    );
                    yield CanonicalEvent::text_delta(inline_error_marker(&provider, &error));
                    let error = if delivered { error.into_partial() } else { error };
                    yield error.into_status(provider, model, elapsed_ms(started));
                }
            }
        }
    }

    /// Run one turn to completion, folding the stream into a [`TurnOutcome`].
    #[instrument(skip_all, fields(conversation = %request.conversation_id, model = %request.model))]
    pub async fn execute(&self, request: TurnRequest) -> TurnOutcome {
        let mut stream = Box::pin(self.stream_turn(request));
        let mut text = String::new();
        let mut invocations = Vec::new();
        let mut grounding = Vec::new();
        let mut terminal = None;
        while let Some(event) = stream.next().await {
            match event {
                CanonicalEvent::TextDelta { text: delta } => text.push_str(&delta),
                CanonicalEvent::ToolCall {
                    call_id,
                    name,
                    argument_fragment,
                } => invocations.push(ToolInvocation {
                    call_id,
                    name: name.unwrap_or_default(),
                    arguments: argument_fragment.unwrap_or_default(),
                }),
                CanonicalEvent::GroundingRefs { refs } => grounding.extend(refs),
                CanonicalEvent::Status {
                    outcome, message, ..
                } => terminal = Some((outcome, message)),
            }
        }
        let (outcome, error) = terminal.unwrap_or((
            StatusOutcome::Error,
            Some("stream ended without a status event".into()),
        ));
        TurnOutcome {
            text,
            invocations,
            grounding,
            outcome,
            error,
        }
    }

    /// Resolve the serving provider and the model id it should see.
    fn route(&self, request: &TurnRequest) -> GatewayResult<(&ProviderDescriptor, String)> {
        match &request.provider_override {
            Some(provider) => {
                let descriptor = self.registry.resolve(provider)?;
                Ok((descriptor, request.model.clone()))
            }
            None => self
                .registry
                .route_model(&request.model)
                .ok_or_else(|| GatewayError::UnknownProvider {
                    provider: request.model.clone(),
                }),
        }
    }

    /// History buffer for one conversation, created on first use.
    fn session(&self, conversation_id: &str) -> Arc<Mutex<HistoryBuffer>> {
        self.sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HistoryBuffer::new(self.config.history_cap))))
            .clone()
    }
}

/// Inline transcript marker emitted ahead of a provider failure's terminal
/// status, so partial output ends with a visible notice instead of
/// trailing off silently.
fn inline_error_marker(provider: &str, error: &GatewayError) -> String {
    format!("\n\n⚠️ **{provider} error**: {error}")
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    registry: Option<ProviderRegistry>,
    credentials: Option<CredentialStore>,
    config: Option<GatewayConfig>,
    adapters: HashMap<TransportKind, Arc<dyn TransportAdapter>>,
}

impl GatewayBuilder {
    /// Fresh builder with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this provider registry instead of the builtin fleet.
    #[must_use]
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use this credential store instead of environment discovery.
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use this configuration instead of reading the environment.
    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Install (or replace) the adapter for its transport kind.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn TransportAdapter>) -> Self {
        let _ = self.adapters.insert(adapter.transport(), adapter);
        self
    }

    /// Build the gateway.
    ///
    /// Unset pieces fall back to defaults: the builtin provider registry,
    /// environment-discovered credentials and configuration, and the four
    /// stock transport adapters sharing one HTTP client.
    pub fn build(self) -> GatewayResult<Gateway> {
        let registry = self.registry.unwrap_or_else(ProviderRegistry::builtin);
        let credentials = self
            .credentials
            .unwrap_or_else(|| CredentialStore::from_env(registry.provider_ids()));
        let config = self.config.unwrap_or_else(GatewayConfig::from_env);

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| GatewayError::Transport {
                message: format!("http client construction failed: {e}"),
            })?;

        let mut adapters = self.adapters;
        let _ = adapters
            .entry(TransportKind::SdkNative)
            .or_insert_with(|| Arc::new(GeminiAdapter::new(client.clone())));
        let _ = adapters
            .entry(TransportKind::OpenAiCompatible)
            .or_insert_with(|| Arc::new(OpenAiCompatAdapter::new(client.clone())));
        let _ = adapters
            .entry(TransportKind::RawSse)
            .or_insert_with(|| Arc::new(RawSseAdapter::new(client.clone())));
        let _ = adapters
            .entry(TransportKind::LongPoll)
            .or_insert_with(|| Arc::new(LongPollAdapter::with_config(client, config.long_poll())));

        Ok(Gateway {
            registry,
            credentials,
            config,
            adapters,
            sessions: DashMap::new(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
