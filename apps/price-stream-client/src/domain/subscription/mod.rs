//! Subscription Registry
//!
//! Tracks the set of symbols the application wants streamed, independent of
//! whether the connection is currently up.
//!
//! # Design
//!
//! The registry is the source of truth for what should be streaming. The
//! server-side subscription state is rebuilt from it after every successful
//! (re)connect with a single batched subscribe, so a symbol committed here is
//! never lost across reconnects.
//!
//! Symbols are normalized to uppercase before they touch the set.

use std::collections::BTreeSet;

use parking_lot::RwLock;

// =============================================================================
// Types
// =============================================================================

/// A normalized (trimmed, uppercase) ticker symbol.
pub type Symbol = String;

/// Normalize a raw symbol.
///
/// Returns `None` for empty or whitespace-only input.
#[must_use]
pub fn normalize_symbol(raw: &str) -> Option<Symbol> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Normalize a batch of raw symbols.
///
/// Duplicates (after normalization) are removed, keeping first-seen order.
#[must_use]
pub fn normalize_batch<I, S>(symbols: I) -> Vec<Symbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    symbols
        .into_iter()
        .filter_map(|s| normalize_symbol(s.as_ref()))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Desired subscription state.
///
/// # Example
///
/// ```rust
/// use price_stream_client::domain::subscription::{SubscriptionRegistry, normalize_batch};
///
/// let registry = SubscriptionRegistry::new();
/// registry.add(&normalize_batch(["tcs", "infy"]));
/// registry.remove(&normalize_batch(["TCS"]));
///
/// assert!(registry.contains("infy"));
/// assert!(!registry.contains("TCS"));
/// assert_eq!(registry.replay_batch(), Some(vec!["INFY".to_string()]));
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    symbols: RwLock<BTreeSet<Symbol>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add already-normalized symbols (set union).
    ///
    /// Returns the number of symbols that were not present before.
    pub fn add(&self, symbols: &[Symbol]) -> usize {
        let mut set = self.symbols.write();
        symbols.iter().filter(|s| set.insert((*s).clone())).count()
    }

    /// Remove already-normalized symbols (set difference).
    ///
    /// Returns the number of symbols that were actually removed.
    pub fn remove(&self, symbols: &[Symbol]) -> usize {
        let mut set = self.symbols.write();
        symbols.iter().filter(|s| set.remove(s.as_str())).count()
    }

    /// Case-insensitive membership check.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        normalize_symbol(symbol).is_some_and(|s| self.symbols.read().contains(&s))
    }

    /// Copy of the current set.
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<Symbol> {
        self.symbols.read().clone()
    }

    /// Number of desired symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    /// Whether nothing is desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }

    /// The symbols to re-assert after a (re)connect, as one batch.
    ///
    /// Returns `None` when there is nothing to replay.
    #[must_use]
    pub fn replay_batch(&self) -> Option<Vec<Symbol>> {
        let set = self.symbols.read();
        if set.is_empty() {
            None
        } else {
            Some(set.iter().cloned().collect())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
