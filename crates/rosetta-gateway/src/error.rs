//! Gateway error taxonomy.
//!
//! Five categories cover every way a turn can fail. None of them ever
//! escapes the streaming contract: the sequencer converts each into a
//! single terminal `status=error` event, and callers distinguish failure
//! only by inspecting that event's outcome.

use rosetta_core::CanonicalEvent;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while serving one turn.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No usable secret for the chosen provider.
    ///
    /// Raised before any network activity: the sequencer fails fast and
    /// never invokes an adapter with an absent credential.
    #[error("no credential configured for provider '{provider}'")]
    MissingCredential {
        /// Provider the turn was routed to.
        provider: String,
    },

    /// Provider id or model id absent from the registry.
    #[error("no provider registered for '{provider}'")]
    UnknownProvider {
        /// The unresolvable id.
        provider: String,
    },

    /// Connection refused, timeout, or a malformed response body.
    #[error("transport error: {message}")]
    Transport {
        /// Error description.
        message: String,
    },

    /// Backend returned a structured error payload.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP status, or the operation-level error code for long-poll jobs.
        status: u16,
        /// Best human-readable message extracted from the payload.
        message: String,
    },

    /// Failure after events were already delivered to the caller.
    #[error("stream failed after partial output: {message}")]
    PartialStream {
        /// Description of the underlying failure.
        message: String,
    },
}

impl GatewayError {
    /// Category string for tracing fields and event emission.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "missing_credential",
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::Transport { .. } => "transport",
            Self::Provider { .. } => "provider",
            Self::PartialStream { .. } => "partial_stream",
        }
    }

    /// Reclassify as [`GatewayError::PartialStream`], keeping the message.
    ///
    /// Used by the sequencer when the failure happened after at least one
    /// event already reached the caller. Already-partial errors pass
    /// through unchanged.
    #[must_use]
    pub fn into_partial(self) -> Self {
        match self {
            Self::PartialStream { .. } => self,
            other => Self::PartialStream {
                message: other.to_string(),
            },
        }
    }

    /// Render the terminal `status=error` event for this failure.
    #[must_use]
    pub fn into_status(
        self,
        provider: impl Into<String>,
        model: impl Into<String>,
        latency_ms: u64,
    ) -> CanonicalEvent {
        CanonicalEvent::failure(provider, model, latency_ms, self.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport {
            message: format!("malformed response body: {err}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
