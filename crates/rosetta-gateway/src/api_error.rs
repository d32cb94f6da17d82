//! Provider error-body parsing.
//!
//! Backends disagree on error envelopes:
//! - OpenAI-style: `{"error": {"message": "...", "type": "..."}}`
//! - Google:       `{"error": {"message": "...", "status": "..."}}`
//! - String form:  `{"error": "..."}`
//! - Flat:         `{"message": "..."}` or `{"detail": "..."}`
//!
//! The shapes are probed in order of specificity, falling back to the raw
//! body so the caller always gets something human-readable.

use serde_json::Value;

use crate::error::GatewayError;

/// Build a [`GatewayError::Provider`] from an error response.
///
/// `status` is the HTTP status (or the operation-level error code for
/// long-poll jobs); `body` is the raw response text.
#[must_use]
pub fn provider_error(status: u16, body: &str) -> GatewayError {
    GatewayError::Provider {
        status,
        message: extract_message(status, body),
    }
}

/// Extract the best human-readable message from an error body.
fn extract_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        // Envelope: {"error": {"message": "..."}}
        if let Some(msg) = json["error"]["message"].as_str() {
            return msg.to_string();
        }

        // String form: {"error": "..."}
        if let Some(msg) = json["error"].as_str() {
            return msg.to_string();
        }

        // Flat: {"message": "..."} or {"detail": "..."}
        if let Some(msg) = json["message"].as_str().or_else(|| json["detail"].as_str()) {
            return msg.to_string();
        }
    }

    // Unrecognized structure or not JSON — include what we have
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {trimmed}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
