//! Provider capability registry and model catalog.
//!
//! The registry is the static routing table for the gateway: per provider,
//! which transport kind it speaks, which features it supports, and where
//! its API lives. The model catalog maps model ids to provider ids so
//! callers can address a model without naming its provider.
//!
//! Both tables are built at construction time and never mutated afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor types
// ─────────────────────────────────────────────────────────────────────────────

/// Wire shape a provider speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Native SDK-style stream (Gemini `streamGenerateContent`).
    SdkNative,
    /// `choices[0].delta` chat-completions stream.
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
    /// Raw SSE byte stream decoded incrementally by the gateway.
    RawSse,
    /// Operation handle polled until done (slow media jobs).
    LongPoll,
}

/// Features a provider supports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Accepts tool/function declarations.
    pub tools: bool,
    /// Accepts inline image payloads.
    pub vision: bool,
    /// Can ground answers with web citations.
    pub grounding: bool,
}

impl ProviderCapabilities {
    /// Build a capability set.
    #[must_use]
    pub const fn new(tools: bool, vision: bool, grounding: bool) -> Self {
        Self {
            tools,
            vision,
            grounding,
        }
    }
}

/// Static description of one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider id (`"gemini"`, `"groq"`, …).
    pub id: String,
    /// Transport the provider speaks.
    pub transport: TransportKind,
    /// Supported features.
    pub capabilities: ProviderCapabilities,
    /// API base URL (meaning is transport-dependent).
    pub base_endpoint: String,
}

impl ProviderDescriptor {
    /// Build a descriptor.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        transport: TransportKind,
        capabilities: ProviderCapabilities,
        base_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            transport,
            capabilities,
            base_endpoint: base_endpoint.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProviderRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Descriptor table plus model catalog.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderDescriptor>,
    catalog: HashMap<String, String>,
}

impl ProviderRegistry {
    /// Empty registry (every resolve fails).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in provider fleet.
    #[must_use]
    pub fn builtin() -> Self {
        let registry = Self::empty()
            .with_provider(ProviderDescriptor::new(
                "gemini",
                TransportKind::SdkNative,
                ProviderCapabilities::new(true, true, true),
                "https://generativelanguage.googleapis.com/v1beta",
            ))
            .with_provider(ProviderDescriptor::new(
                "groq",
                TransportKind::OpenAiCompatible,
                ProviderCapabilities::new(true, true, false),
                "https://api.groq.com/openai/v1",
            ))
            .with_provider(ProviderDescriptor::new(
                "mistral",
                TransportKind::OpenAiCompatible,
                ProviderCapabilities::new(true, false, false),
                "https://api.mistral.ai/v1",
            ))
            .with_provider(ProviderDescriptor::new(
                "deepseek",
                TransportKind::OpenAiCompatible,
                ProviderCapabilities::new(true, false, false),
                "https://api.deepseek.com",
            ))
            .with_provider(ProviderDescriptor::new(
                "openai",
                TransportKind::OpenAiCompatible,
                ProviderCapabilities::new(true, true, false),
                "https://api.openai.com/v1",
            ))
            .with_provider(ProviderDescriptor::new(
                "xai",
                TransportKind::OpenAiCompatible,
                ProviderCapabilities::new(true, false, false),
                "https://api.x.ai/v1",
            ))
            .with_provider(ProviderDescriptor::new(
                "openrouter",
                TransportKind::RawSse,
                ProviderCapabilities::new(true, true, false),
                "https://openrouter.ai/api/v1",
            ))
            .with_provider(ProviderDescriptor::new(
                "veo",
                TransportKind::LongPoll,
                ProviderCapabilities::new(false, false, false),
                "https://generativelanguage.googleapis.com/v1beta",
            ));

        registry
            .with_model("gemini-3-pro-preview", "gemini")
            .with_model("gemini-3-flash-preview", "gemini")
            .with_model("llama-3.3-70b-versatile", "groq")
            .with_model("deepseek-r1-distill-llama-70b", "groq")
            .with_model("llama-3.2-90b-vision-preview", "groq")
            .with_model("mistral-large-latest", "mistral")
            .with_model("grok-2-latest", "xai")
            .with_model("openai/gpt-4o", "openrouter")
            .with_model("anthropic/claude-3.5-sonnet", "openrouter")
            .with_model("google/gemini-pro-1.5", "openrouter")
            .with_model("veo-3.1-fast-generate-preview", "veo")
    }

    /// Add or replace a provider descriptor (construction-time builder).
    #[must_use]
    pub fn with_provider(mut self, descriptor: ProviderDescriptor) -> Self {
        let _ = self.providers.insert(descriptor.id.clone(), descriptor);
        self
    }

    /// Map a model id to a provider id (construction-time builder).
    #[must_use]
    pub fn with_model(
        mut self,
        model_id: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        let _ = self.catalog.insert(model_id.into(), provider_id.into());
        self
    }

    /// Look up a provider descriptor.
    pub fn resolve(&self, provider_id: &str) -> GatewayResult<&ProviderDescriptor> {
        self.providers
            .get(provider_id)
            .ok_or_else(|| GatewayError::UnknownProvider {
                provider: provider_id.to_string(),
            })
    }

    /// Resolve the serving provider for a model id, and the model id that
    /// provider should see.
    ///
    /// Resolution order:
    /// 1. Exact catalog match — this keeps aggregator model ids containing
    ///    `/` (e.g. `openai/gpt-4o` served via an aggregator) routed where
    ///    the catalog says, not where the prefix points. The model id
    ///    passes through unchanged.
    /// 2. Explicit `provider/model` prefix, accepted only when the prefix is
    ///    a registered provider id. The prefix is stripped; the provider
    ///    sees only the remainder.
    ///
    /// Unknown models return `None` (strict fail-fast; the sequencer turns
    /// this into a terminal error before any network call).
    #[must_use]
    pub fn route_model(&self, model_id: &str) -> Option<(&ProviderDescriptor, String)> {
        if let Some(provider) = self.catalog.get(model_id) {
            return self
                .providers
                .get(provider)
                .map(|descriptor| (descriptor, model_id.to_string()));
        }
        if let Some((prefix, rest)) = model_id.split_once('/') {
            if let Some(descriptor) = self.providers.get(prefix) {
                return Some((descriptor, rest.to_string()));
            }
        }
        None
    }

    /// Detect which provider serves a model id. See [`Self::route_model`]
    /// for the resolution rules.
    #[must_use]
    pub fn provider_for_model(&self, model_id: &str) -> Option<&str> {
        self.route_model(model_id)
            .map(|(descriptor, _)| descriptor.id.as_str())
    }

    /// All registered provider ids (iteration order unspecified).
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_resolves_every_provider() {
        let registry = ProviderRegistry::builtin();
        let expectations = [
            ("gemini", TransportKind::SdkNative),
            ("groq", TransportKind::OpenAiCompatible),
            ("mistral", TransportKind::OpenAiCompatible),
            ("deepseek", TransportKind::OpenAiCompatible),
            ("openai", TransportKind::OpenAiCompatible),
            ("xai", TransportKind::OpenAiCompatible),
            ("openrouter", TransportKind::RawSse),
            ("veo", TransportKind::LongPoll),
        ];
        for (id, transport) in expectations {
            let descriptor = registry.resolve(id).unwrap();
            assert_eq!(descriptor.transport, transport, "{id}");
            assert!(!descriptor.base_endpoint.is_empty());
        }
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let registry = ProviderRegistry::builtin();
        let err = registry.resolve("cohere").unwrap_err();
        assert_eq!(err.category(), "unknown_provider");
        assert!(err.to_string().contains("cohere"));
    }

    #[test]
    fn catalog_match_beats_prefix() {
        let registry = ProviderRegistry::builtin();
        // "openai/gpt-4o" is served via the aggregator even though "openai"
        // is itself a registered provider.
        assert_eq!(registry.provider_for_model("openai/gpt-4o"), Some("openrouter"));
        assert_eq!(
            registry.provider_for_model("anthropic/claude-3.5-sonnet"),
            Some("openrouter")
        );
    }

    #[test]
    fn prefix_fallback_requires_registered_provider() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.provider_for_model("gemini/custom-tuned"), Some("gemini"));
        assert_eq!(registry.provider_for_model("qwen/qwen-72b"), None);
    }

    #[test]
    fn prefix_routing_strips_the_prefix() {
        let registry = ProviderRegistry::builtin();
        let (descriptor, model) = registry.route_model("gemini/custom-tuned").unwrap();
        assert_eq!(descriptor.id, "gemini");
        assert_eq!(model, "custom-tuned");
    }

    #[test]
    fn catalog_routing_keeps_the_full_id() {
        let registry = ProviderRegistry::builtin();
        let (descriptor, model) = registry.route_model("openai/gpt-4o").unwrap();
        assert_eq!(descriptor.id, "openrouter");
        assert_eq!(model, "openai/gpt-4o");
    }

    #[test]
    fn unknown_model_returns_none() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.provider_for_model("wizardlm-2"), None);
    }

    #[test]
    fn grounding_only_on_gemini() {
        let registry = ProviderRegistry::builtin();
        assert!(registry.resolve("gemini").unwrap().capabilities.grounding);
        for id in ["groq", "mistral", "openrouter", "veo"] {
            assert!(!registry.resolve(id).unwrap().capabilities.grounding, "{id}");
        }
    }

    #[test]
    fn transport_kind_serializes_kebab_case() {
        let cases = [
            (TransportKind::SdkNative, "\"sdk-native\""),
            (TransportKind::OpenAiCompatible, "\"openai-compatible\""),
            (TransportKind::RawSse, "\"raw-sse\""),
            (TransportKind::LongPoll, "\"long-poll\""),
        ];
        for (kind, expected) in cases {
            assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
        }
    }

    #[test]
    fn custom_registry_builds_from_empty() {
        let registry = ProviderRegistry::empty()
            .with_provider(ProviderDescriptor::new(
                "local",
                TransportKind::OpenAiCompatible,
                ProviderCapabilities::new(true, false, false),
                "http://localhost:8080/v1",
            ))
            .with_model("qwen-7b", "local");
        assert_eq!(registry.provider_for_model("qwen-7b"), Some("local"));
        assert!(registry.resolve("gemini").is_err());
    }
}
