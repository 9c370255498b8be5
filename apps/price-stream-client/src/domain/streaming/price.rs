use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::subscription::{Symbol, normalize_symbol};

/// Field names checked, in order, by [`PricePayload::last_price`].
const LAST_PRICE_FIELDS: [&str; 3] = ["last", "current_price", "price"];

/// Opaque per-symbol price payload as emitted by the server.
///
/// The payload is kept exactly as received; `null` is a valid payload (the
/// backend sends it for symbols it failed to quote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricePayload(Value);

impl PricePayload {
    /// Wrap a raw JSON value.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// A single top-level field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Last traded price, from the first of `last`, `current_price` or
    /// `price` that holds a number or numeric string.
    #[must_use]
    pub fn last_price(&self) -> Option<Decimal> {
        LAST_PRICE_FIELDS
            .iter()
            .filter_map(|name| self.field(name))
            .find_map(decimal_from_value)
    }
}

impl From<Value> for PricePayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// One `price_update` delta: symbol to payload.
pub type PriceUpdate = BTreeMap<Symbol, PricePayload>;

/// A cached payload and when it was last written.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    /// Latest payload for the symbol.
    pub payload: PricePayload,
    /// Wall-clock time of the write.
    pub updated_at: DateTime<Utc>,
}

/// Shared last-value cache keyed by symbol.
///
/// Last writer wins per symbol and no history is retained. Entries are never
/// removed, not even when the symbol is unsubscribed.
#[derive(Debug, Default)]
pub struct PriceStore {
    entries: RwLock<HashMap<Symbol, PriceEntry>>,
}

impl PriceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a delta into the cache, overwriting each symbol's payload.
    ///
    /// Keys are normalized; entries with an empty key are skipped. Returns the
    /// normalized delta that was applied.
    pub fn ingest<I>(&self, update: I) -> PriceUpdate
    where
        I: IntoIterator<Item = (String, PricePayload)>,
    {
        let delta: PriceUpdate = update
            .into_iter()
            .filter_map(|(symbol, payload)| normalize_symbol(&symbol).map(|s| (s, payload)))
            .collect();

        if delta.is_empty() {
            return delta;
        }

        let updated_at = Utc::now();
        let mut entries = self.entries.write();
        for (symbol, payload) in &delta {
            entries.insert(
                symbol.clone(),
                PriceEntry {
                    payload: payload.clone(),
                    updated_at,
                },
            );
        }

        delta
    }

    /// Case-insensitive lookup. Unknown symbols yield `None`.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<PricePayload> {
        self.entry(symbol).map(|e| e.payload)
    }

    /// Case-insensitive lookup including the write timestamp.
    #[must_use]
    pub fn entry(&self, symbol: &str) -> Option<PriceEntry> {
        let symbol = normalize_symbol(symbol)?;
        self.entries.read().get(&symbol).cloned()
    }

    /// Copy of every cached payload.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<Symbol, PricePayload> {
        self.entries
            .read()
            .iter()
            .map(|(symbol, entry)| (symbol.clone(), entry.payload.clone()))
            .collect()
    }

    /// Number of cached symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
