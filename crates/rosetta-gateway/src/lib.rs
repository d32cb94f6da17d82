//! # rosetta-gateway
//!
//! Multi-provider streaming inference gateway.
//!
//! One [`Gateway`] fronts a fleet of model providers that disagree on
//! transport and wire format, and serves every turn through the same
//! canonical contract: zero or more content events, then exactly one
//! terminal `status` event.
//!
//! - **Routing**: a [`ProviderRegistry`] maps model ids (catalog entries or
//!   `provider/model` prefixes) to provider descriptors
//! - **Credentials**: per-provider secret pools with round-robin rotation,
//!   discovered from `ROSETTA_*` environment variables
//! - **Transports**: four adapters behind one trait — SDK-native streaming,
//!   OpenAI-compatible deltas, raw SSE decoded in-house, and long-poll
//!   operations
//! - **Sequencing**: bounded history injection, capability gating,
//!   tool-call reassembly, and exactly-once terminal status events
//!
//! Turns are served as lazy streams: nothing is dispatched until first
//! poll, and dropping a stream abandons the turn cleanly.

#![deny(unsafe_code)]

pub mod accumulator;
pub mod adapters;
pub mod api_error;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod registry;
pub mod sequencer;
pub mod sse;

pub use adapters::{AdapterRequest, RawEventStream, RawProviderEvent, TransportAdapter};
pub use config::GatewayConfig;
pub use credentials::{CredentialPool, CredentialStore};
pub use error::{GatewayError, GatewayResult};
pub use registry::{ProviderCapabilities, ProviderDescriptor, ProviderRegistry, TransportKind};
pub use sequencer::{Gateway, GatewayBuilder, TurnOutcome, TurnRequest};
