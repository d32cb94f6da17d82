//! # rosetta-core
//!
//! Provider-agnostic vocabulary for the Rosetta inference gateway.
//!
//! This crate defines the shared shapes the gateway and its callers agree on:
//!
//! - **Canonical events**: [`CanonicalEvent`] — the one normalized stream
//!   shape emitted regardless of which backend produced it, terminated by
//!   exactly one `status` event
//! - **Turns**: [`ConversationTurn`] with roles and optional inline binary
//!   payloads for vision input
//! - **Tool schema**: [`ToolDeclaration`] with a JSON-Schema-like parameter
//!   object, translatable into both provider tool-calling conventions
//!
//! No I/O lives here; everything is plain serde-serializable data.

#![deny(unsafe_code)]

pub mod events;
pub mod tools;
pub mod turns;

pub use events::{CanonicalEvent, GroundingRef, StatusOutcome, ToolInvocation};
pub use tools::{ToolDeclaration, ToolParameterSchema};
pub use turns::{ConversationTurn, InlinePayload, Role};
