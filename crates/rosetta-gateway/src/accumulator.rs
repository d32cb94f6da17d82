//! Tool-call accumulation.
//!
//! Function-call payloads arrive fragmented: a name on one event, argument
//! JSON split across several more. The accumulator folds those fragments
//! back into whole [`ToolInvocation`]s.
//!
//! Lifecycle per call: `Idle → Accumulating(call_id) → Closed`. Exactly one
//! accumulation is open at a time. Fragments are routed by wire `index`
//! when the transport provides one; a fragment bearing a new identity
//! closes the open call first. Argument fragments concatenate strictly in
//! arrival order — providers stream argument JSON in pieces and
//! concatenation order is load-bearing.
//!
//! Calls that arrive without a wire id get a synthesized
//! `call_{prefix}_{n}` id, unique within the accumulator.

use rosetta_core::ToolInvocation;
use tracing::debug;
use uuid::Uuid;

use crate::adapters::ToolCallFragment;

/// Folds streamed tool-call fragments into completed invocations.
#[derive(Debug)]
pub struct ToolCallAccumulator {
    open: Option<Pending>,
    prefix: String,
    next_synthetic: u32,
}

/// The one in-flight accumulation.
#[derive(Debug)]
struct Pending {
    call_id: String,
    wire_id: Option<String>,
    index: Option<u32>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAccumulator {
    /// Fresh accumulator with a unique synthetic-id prefix.
    #[must_use]
    pub fn new() -> Self {
        let hex = Uuid::now_v7().simple().to_string();
        Self {
            open: None,
            prefix: hex[..8].to_string(),
            next_synthetic: 0,
        }
    }

    /// Fold one fragment; returns any invocations completed by it.
    ///
    /// Usually empty or a single element: a fragment with a new identity
    /// can close the previous call, and a `complete` fragment closes its
    /// own call immediately.
    pub fn absorb(&mut self, fragment: ToolCallFragment) -> Vec<ToolInvocation> {
        let mut completed = Vec::new();

        if self.is_new_identity(&fragment) {
            if let Some(done) = self.close_open() {
                completed.push(done);
            }
        }

        match &mut self.open {
            Some(pending) => {
                if pending.name.is_none() {
                    pending.name = fragment.name;
                }
                if let Some(args) = fragment.argument_fragment {
                    pending.arguments.push_str(&args);
                }
            }
            None => {
                let call_id = match &fragment.call_id {
                    Some(id) => id.clone(),
                    None => self.synthesize_id(),
                };
                self.open = Some(Pending {
                    call_id,
                    wire_id: fragment.call_id,
                    index: fragment.index,
                    name: fragment.name,
                    arguments: fragment.argument_fragment.unwrap_or_default(),
                });
            }
        }

        if fragment.complete {
            if let Some(done) = self.close_open() {
                completed.push(done);
            }
        }

        completed
    }

    /// Best-effort flush when the overall stream ends.
    pub fn finish(&mut self) -> Option<ToolInvocation> {
        self.close_open()
    }

    /// Whether a fragment belongs to a different call than the open one.
    fn is_new_identity(&self, fragment: &ToolCallFragment) -> bool {
        let Some(pending) = &self.open else {
            return false;
        };
        if let (Some(index), Some(open_index)) = (fragment.index, pending.index) {
            return index != open_index;
        }
        if let Some(id) = &fragment.call_id {
            return pending.wire_id.as_ref() != Some(id);
        }
        // No index and no id: a second name-bearing fragment is a new whole
        // call (SDK-native transports send complete calls back to back).
        fragment.name.is_some() && pending.name.is_some()
    }

    fn close_open(&mut self) -> Option<ToolInvocation> {
        let pending = self.open.take()?;
        match pending.name {
            Some(name) => Some(ToolInvocation {
                call_id: pending.call_id,
                name,
                arguments: pending.arguments,
            }),
            None => {
                debug!(
                    call_id = %pending.call_id,
                    "discarding accumulated call without a name"
                );
                None
            }
        }
    }

    fn synthesize_id(&mut self) -> String {
        let id = format!("call_{}_{}", self.prefix, self.next_synthetic);
        self.next_synthetic += 1;
        id
    }
}

impl Default for ToolCallAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
