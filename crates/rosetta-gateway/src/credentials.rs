//! Credential pools with round-robin rotation.
//!
//! Each provider gets an ordered pool of API secrets. [`CredentialPool::acquire`]
//! hands out secrets in cyclic order via an atomic cursor, so concurrent
//! turns spread load across keys without locking. An empty pool is not an
//! error: `acquire` returns `None` and the sequencer decides policy (fail
//! fast, no network attempt).
//!
//! Discovery convention for provider id `p` (uppercased, `-` → `_`), in
//! priority order:
//!
//! 1. `ROSETTA_{P}_API_KEY`, then `{P}_API_KEY`
//! 2. for n in 1..=20: `ROSETTA_{P}_KEY_{n}`, then `{P}_KEY_{n}`
//!
//! Values are trimmed; values of length ≤ 5 are treated as placeholders and
//! ignored; duplicates keep their first position; discovery order is pool
//! order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

/// Env var prefix for project-scoped secrets.
const ENV_PREFIX: &str = "ROSETTA";

/// Highest numbered key probed during discovery.
const MAX_NUMBERED_KEYS: usize = 20;

/// Secrets at or below this length are placeholders, not keys.
const MIN_SECRET_LEN: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// CredentialPool
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered set of secrets for one provider, with a rotation cursor.
#[derive(Debug)]
pub struct CredentialPool {
    provider_id: String,
    secrets: Vec<String>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    /// Build a pool from raw candidate secrets.
    ///
    /// Candidates are trimmed; values of length ≤ 5 and duplicates are
    /// dropped (the first occurrence keeps its position).
    #[must_use]
    pub fn new(
        provider_id: impl Into<String>,
        candidates: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut secrets: Vec<String> = Vec::new();
        for candidate in candidates {
            let value = candidate.trim();
            if value.len() <= MIN_SECRET_LEN {
                continue;
            }
            if secrets.iter().any(|s| s == value) {
                continue;
            }
            secrets.push(value.to_string());
        }
        Self {
            provider_id: provider_id.into(),
            secrets,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build a pool for `provider_id` from process environment variables.
    #[must_use]
    pub fn from_env(provider_id: &str) -> Self {
        let candidates = discover_with(provider_id, |name| std::env::var(name).ok());
        let pool = Self::new(provider_id, candidates);
        debug!(
            provider = provider_id,
            keys = pool.len(),
            "credential pool discovered from environment"
        );
        pool
    }

    /// Next secret in rotation, or `None` for an empty pool.
    ///
    /// Over K acquisitions against a pool of size P, each secret is
    /// returned ⌊K/P⌋ or ⌈K/P⌉ times, cycling from index 0. Thread-safe:
    /// the cursor is a single atomic `fetch_add`.
    pub fn acquire(&self) -> Option<&str> {
        if self.secrets.is_empty() {
            return None;
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.secrets.len();
        self.secrets.get(slot).map(String::as_str)
    }

    /// Number of usable secrets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether the pool holds no secrets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Provider this pool belongs to.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CredentialStore
// ─────────────────────────────────────────────────────────────────────────────

/// All credential pools, keyed by provider id.
///
/// Built once at gateway construction; immutable afterwards except for the
/// rotation cursors inside each pool.
#[derive(Debug, Default)]
pub struct CredentialStore {
    pools: HashMap<String, CredentialPool>,
}

impl CredentialStore {
    /// Empty store (every acquisition returns `None`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover pools from the environment for the given provider ids.
    #[must_use]
    pub fn from_env<I, S>(provider_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        for id in provider_ids {
            let pool = CredentialPool::from_env(id.as_ref());
            let _ = store.pools.insert(pool.provider_id().to_string(), pool);
        }
        store
    }

    /// Add or replace the pool for one provider (construction-time builder).
    #[must_use]
    pub fn with_pool(mut self, pool: CredentialPool) -> Self {
        let _ = self.pools.insert(pool.provider_id().to_string(), pool);
        self
    }

    /// Next secret for `provider_id`, or `None` when unconfigured or empty.
    #[must_use]
    pub fn acquire(&self, provider_id: &str) -> Option<String> {
        self.pools
            .get(provider_id)
            .and_then(CredentialPool::acquire)
            .map(str::to_string)
    }

    /// Pool size for `provider_id` (0 when unconfigured).
    #[must_use]
    pub fn pool_len(&self, provider_id: &str) -> usize {
        self.pools.get(provider_id).map_or(0, CredentialPool::len)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Discovery (pure, testable without env vars)
// ─────────────────────────────────────────────────────────────────────────────

/// Candidate env var names for one provider, in priority order.
fn candidate_names(provider_id: &str) -> Vec<String> {
    let p = provider_id.to_ascii_uppercase().replace('-', "_");
    let mut names = vec![format!("{ENV_PREFIX}_{p}_API_KEY"), format!("{p}_API_KEY")];
    for n in 1..=MAX_NUMBERED_KEYS {
        names.push(format!("{ENV_PREFIX}_{p}_KEY_{n}"));
        names.push(format!("{p}_KEY_{n}"));
    }
    names
}

/// Collect candidate secrets via `lookup`, preserving discovery order.
fn discover_with(provider_id: &str, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    candidate_names(provider_id)
        .iter()
        .filter_map(|name| lookup(name))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pool_of(secrets: &[&str]) -> CredentialPool {
        CredentialPool::new("gemini", secrets.iter().map(|s| (*s).to_string()))
    }

    // ── rotation ──

    #[test]
    fn rotation_cycles_from_index_zero() {
        let pool = pool_of(&["secret-a", "secret-b", "secret-c"]);
        let order: Vec<&str> = (0..6).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(
            order,
            ["secret-a", "secret-b", "secret-c", "secret-a", "secret-b", "secret-c"]
        );
    }

    #[test]
    fn rotation_is_fair_over_uneven_counts() {
        let pool = pool_of(&["secret-a", "secret-b", "secret-c"]);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for _ in 0..10 {
            *counts.entry(pool.acquire().unwrap()).or_default() += 1;
        }
        // 10 acquisitions over 3 secrets: ⌈10/3⌉ = 4 once, ⌊10/3⌋ = 3 twice
        let mut observed: Vec<usize> = counts.values().copied().collect();
        observed.sort_unstable();
        assert_eq!(observed, [3, 3, 4]);
    }

    #[test]
    fn empty_pool_returns_none() {
        let pool = pool_of(&[]);
        assert!(pool.is_empty());
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.acquire(), None);
    }

    #[test]
    fn concurrent_acquisition_stays_fair() {
        let pool = Arc::new(pool_of(&["secret-a", "secret-b", "secret-c", "secret-d"]));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                let mut counts: HashMap<String, usize> = HashMap::new();
                for _ in 0..25 {
                    *counts.entry(pool.acquire().unwrap().to_string()).or_default() += 1;
                }
                counts
            }));
        }
        let mut totals: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for (secret, count) in handle.join().unwrap() {
                *totals.entry(secret).or_default() += count;
            }
        }
        // 200 acquisitions over 4 secrets: every fetch_add yields a distinct
        // cursor value, so each secret is hit exactly 50 times.
        assert_eq!(totals.len(), 4);
        assert!(totals.values().all(|&count| count == 50));
    }

    // ── construction filters ──

    #[test]
    fn short_values_are_placeholders() {
        let pool = pool_of(&["12345", "123456"]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.acquire(), Some("123456"));
    }

    #[test]
    fn duplicates_keep_first_position() {
        let pool = pool_of(&["secret-a", "secret-b", "secret-a"]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.acquire(), Some("secret-a"));
        assert_eq!(pool.acquire(), Some("secret-b"));
        assert_eq!(pool.acquire(), Some("secret-a"));
    }

    #[test]
    fn values_are_trimmed() {
        let pool = pool_of(&["  secret-a  ", "secret-a"]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.acquire(), Some("secret-a"));
    }

    // ── store ──

    #[test]
    fn store_acquires_per_provider() {
        let store = CredentialStore::new()
            .with_pool(CredentialPool::new("gemini", vec!["gemini-key-1".to_string()]))
            .with_pool(CredentialPool::new("groq", vec!["groq-key-1".to_string()]));
        assert_eq!(store.acquire("gemini"), Some("gemini-key-1".into()));
        assert_eq!(store.acquire("groq"), Some("groq-key-1".into()));
        assert_eq!(store.acquire("mistral"), None);
        assert_eq!(store.pool_len("gemini"), 1);
        assert_eq!(store.pool_len("mistral"), 0);
    }

    // ── discovery ──

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn discovery_prefers_prefixed_main_key() {
        let vars = [
            ("GEMINI_API_KEY", "bare-main-key"),
            ("ROSETTA_GEMINI_API_KEY", "prefixed-main-key"),
        ];
        let found = discover_with("gemini", lookup_from(&vars));
        assert_eq!(found, ["prefixed-main-key", "bare-main-key"]);
    }

    #[test]
    fn discovery_walks_numbered_keys_in_order() {
        let vars = [
            ("GROQ_API_KEY", "groq-main-key"),
            ("GROQ_KEY_1", "groq-key-one"),
            ("GROQ_KEY_3", "groq-key-three"),
            ("ROSETTA_GROQ_KEY_2", "groq-key-two"),
        ];
        let found = discover_with("groq", lookup_from(&vars));
        assert_eq!(
            found,
            ["groq-main-key", "groq-key-one", "groq-key-two", "groq-key-three"]
        );
    }

    #[test]
    fn discovery_stops_at_twenty_numbered_keys() {
        let names = candidate_names("mistral");
        assert!(names.contains(&"MISTRAL_KEY_20".to_string()));
        assert!(!names.contains(&"MISTRAL_KEY_21".to_string()));
    }

    #[test]
    fn discovery_normalizes_dashed_ids() {
        let names = candidate_names("open-router");
        assert_eq!(names[0], "ROSETTA_OPEN_ROUTER_API_KEY");
        assert_eq!(names[1], "OPEN_ROUTER_API_KEY");
    }

    #[test]
    fn discovered_pool_applies_filters() {
        let vars = [
            ("VEO_API_KEY", "veo-main-key"),
            ("VEO_KEY_1", "tiny"),
            ("VEO_KEY_2", "veo-main-key"),
            ("VEO_KEY_3", "veo-key-three"),
        ];
        let pool = CredentialPool::new("veo", discover_with("veo", lookup_from(&vars)));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.acquire(), Some("veo-main-key"));
        assert_eq!(pool.acquire(), Some("veo-key-three"));
    }
}
