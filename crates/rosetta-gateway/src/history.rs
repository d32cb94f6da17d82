//! Bounded conversation history.
//!
//! A sliding window of the most recent turns, re-injected as context into
//! each new call. The cap counts individual turns and is kept even so the
//! window always holds whole user/assistant exchanges; the oldest turns
//! are discarded first once the cap is exceeded.
//!
//! One buffer belongs to one conversation. The gateway keeps buffers in a
//! per-conversation map; concurrent turns against the same conversation
//! are not expected, and if they happen the outcome is last-writer-wins.

use std::collections::VecDeque;

use rosetta_core::ConversationTurn;

/// Sliding window of prior turns for one conversation.
#[derive(Debug)]
pub struct HistoryBuffer {
    turns: VecDeque<ConversationTurn>,
    cap: usize,
}

impl HistoryBuffer {
    /// Default window: five exchanges.
    pub const DEFAULT_CAP: usize = 10;

    /// Build a buffer holding at most `cap` turns.
    ///
    /// Odd caps are rounded down to the next even value so the window
    /// never splits an exchange. A cap of zero disables history.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            cap: cap & !1,
        }
    }

    /// Append one completed exchange, evicting the oldest turns past the cap.
    pub fn push_exchange(&mut self, user: ConversationTurn, assistant: ConversationTurn) {
        self.turns.push_back(user);
        self.turns.push_back(assistant);
        while self.turns.len() > self.cap {
            let _ = self.turns.pop_front();
        }
    }

    /// Clone the current window, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// Number of retained turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of retained turns.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAP)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
