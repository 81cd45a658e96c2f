//! # Snapshot Store
//!
//! Holds the result of the last completed refresh cycle. Publication is a
//! single pointer swap: a reader holds either the previous snapshot or the
//! new one, never a mix, and never waits on a writer.

use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::Arc;

use crate::round_codec::FeedFailure;
use crate::types::{normalize_symbol, PriceEntry, ReserveEntry};

/// All prices produced by one refresh cycle.
///
/// Every entry was read at `block_number`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub entries: Vec<PriceEntry>,
    #[serde(serialize_with = "serialize_block")]
    pub block_number: u64,
    /// ISO-8601 completion time of the cycle.
    pub completed_at: String,
    pub failures: Vec<FeedFailure>,
}

impl Snapshot {
    pub fn lookup(&self, symbol: &str) -> Option<&PriceEntry> {
        let normalized = normalize_symbol(symbol);
        self.entries.iter().find(|e| e.symbol == normalized)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveSummary {
    pub total_assets: usize,
    /// Latest `updated_at` among the entries, absent when there are none.
    pub last_updated: Option<String>,
}

/// Proof of Reserve readings of one batch, keyed by asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservesSnapshot {
    pub timestamp: String,
    #[serde(serialize_with = "serialize_block")]
    pub block_number: u64,
    #[serde(rename = "totalReserves")]
    pub entries: Vec<ReserveEntry>,
    pub summary: ReserveSummary,
}

impl ReservesSnapshot {
    pub fn new(timestamp: String, block_number: u64, entries: Vec<ReserveEntry>) -> Self {
        // ISO strings share the +00:00 offset, so the lexical max is the latest
        let last_updated = entries.iter().map(|e| e.updated_at.clone()).max();
        Self {
            timestamp,
            block_number,
            summary: ReserveSummary {
                total_assets: entries.len(),
                last_updated,
            },
            entries,
        }
    }

    pub fn lookup(&self, identifier: &str) -> Option<&ReserveEntry> {
        let clean = normalize_symbol(identifier);
        let raw_upper = identifier.to_uppercase();
        self.entries.iter().find(|e| {
            e.symbol == clean
                || e.asset.replace('.', "").to_uppercase() == clean
                || e.asset.to_uppercase() == raw_upper
        })
    }
}

fn serialize_block<S: serde::Serializer>(block: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&block.to_string())
}

/// Atomically swappable holder of the latest published value.
pub struct SnapshotStore<T> {
    current: ArcSwapOption<T>,
}

impl<T> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }
}

impl<T> SnapshotStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first publish.
    pub fn get(&self) -> Option<Arc<T>> {
        self.current.load_full()
    }

    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.current.store(Some(value.clone()));
        value
    }
}

impl SnapshotStore<Snapshot> {
    pub fn lookup(&self, symbol: &str) -> Option<PriceEntry> {
        self.get().and_then(|s| s.lookup(symbol).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawReading;
    use ethers::types::{Address, I256};

    fn entry(symbol: &str, updated_at: &str) -> PriceEntry {
        PriceEntry {
            symbol: symbol.to_string(),
            price: 1.0,
            decimals: 8,
            round_id: "1".to_string(),
            updated_at: updated_at.to_string(),
            proxy_address: Address::zero(),
            raw: RawReading {
                round_id: 1,
                answer: I256::from(100_000_000i64),
                started_at: 0,
                updated_at: 0,
                answered_in_round: 1,
            },
        }
    }

    fn snapshot(block: u64, symbols: &[&str]) -> Snapshot {
        Snapshot {
            entries: symbols.iter().map(|s| entry(s, "2024-01-01T00:00:00+00:00")).collect(),
            block_number: block,
            completed_at: "2024-01-01T00:00:01+00:00".to_string(),
            failures: Vec::new(),
        }
    }

    fn reserve(symbol: &str, asset: &str, updated_at: &str) -> ReserveEntry {
        ReserveEntry {
            symbol: symbol.to_string(),
            asset: asset.to_string(),
            total_reserves: 10.0,
            decimals: 8,
            raw_reserves: "1000000000".to_string(),
            updated_at: updated_at.to_string(),
            round_id: "7".to_string(),
            proxy_address: Address::zero(),
            description: format!("{} Proof of Reserve", asset),
        }
    }

    #[test]
    fn empty_until_first_publish() {
        let store: SnapshotStore<Snapshot> = SnapshotStore::new();
        assert!(store.get().is_none());
        assert!(store.lookup("BTCUSD").is_none());
    }

    #[test]
    fn publish_replaces_wholesale() {
        let store = SnapshotStore::new();
        store.publish(snapshot(100, &["BTCUSD", "ETHUSD"]));
        let held = store.get().unwrap();

        store.publish(snapshot(101, &["AVAXUSD"]));
        // earlier readers keep their complete snapshot
        assert_eq!(held.block_number, 100);
        assert_eq!(held.entries.len(), 2);

        let current = store.get().unwrap();
        assert_eq!(current.block_number, 101);
        assert!(store.lookup("BTCUSD").is_none());
        assert_eq!(store.lookup("avax/usd").unwrap().symbol, "AVAXUSD");
    }

    #[test]
    fn lookup_normalizes_identifier() {
        let snap = snapshot(1, &["BTCUSD"]);
        assert!(snap.lookup(" btc / usd ").is_some());
        assert!(snap.lookup("BTC/USD").is_some());
        assert!(snap.lookup("ETHUSD").is_none());
    }

    #[test]
    fn reserve_summary_takes_latest_update() {
        let snap = ReservesSnapshot::new(
            "2024-03-01T00:00:00+00:00".to_string(),
            5,
            vec![
                reserve("BTCBPOR", "BTC.b", "2024-02-01T10:00:00+00:00"),
                reserve("WBTCPOR", "WBTC", "2024-02-03T09:00:00+00:00"),
            ],
        );
        assert_eq!(snap.summary.total_assets, 2);
        assert_eq!(snap.summary.last_updated.as_deref(), Some("2024-02-03T09:00:00+00:00"));

        let empty = ReservesSnapshot::new("2024-03-01T00:00:00+00:00".to_string(), 5, Vec::new());
        assert_eq!(empty.summary.total_assets, 0);
        assert!(empty.summary.last_updated.is_none());
    }

    #[test]
    fn reserve_lookup_matches_symbol_or_asset() {
        let snap = ReservesSnapshot::new(
            "t".to_string(),
            5,
            vec![reserve("BTCBPOR", "BTC.b", "2024-02-01T10:00:00+00:00")],
        );
        assert!(snap.lookup("btcbpor").is_some());
        assert!(snap.lookup("BTCB").is_some());
        assert!(snap.lookup("btc.b").is_some());
        assert!(snap.lookup("ETH").is_none());
    }

    #[test]
    fn block_number_serializes_as_string() {
        let json = serde_json::to_value(snapshot(41_000_000, &[])).unwrap();
        assert_eq!(json["blockNumber"], "41000000");
        assert_eq!(json["completedAt"], "2024-01-01T00:00:01+00:00");
    }
}
