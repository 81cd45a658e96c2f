//! Proof of Reserve aggregation.
//!
//! Reserve feeds go through the same batch path as prices but publish into a
//! separate store, keyed by the backing asset.

use log::{info, warn};
use std::sync::Arc;

use crate::error::FeedError;
use crate::metrics;
use crate::price_service::PriceService;
use crate::round_codec::{decode_batch, encode_latest_round_calls};
use crate::snapshot_store::ReservesSnapshot;
use crate::types::conversions::now_iso;
use crate::types::ReserveEntry;

impl PriceService {
    /// Reads every reserve feed in one batch and publishes the result.
    ///
    /// A transport failure leaves the previous reserve snapshot published.
    pub async fn reserves_snapshot(&self) -> Result<Arc<ReservesSnapshot>, FeedError> {
        let feeds = self.registry.reserve_feeds();
        if feeds.is_empty() {
            let block_number = self.transport.block_number().await?;
            return Ok(self
                .reserves
                .publish(ReservesSnapshot::new(now_iso(), block_number, Vec::new())));
        }

        let calls = encode_latest_round_calls(&feeds);
        let batch = self.transport.aggregate(&calls).await.map_err(|e| {
            warn!("❌ Reserve batch failed: {}", e);
            FeedError::from(e)
        })?;

        let decoded = decode_batch(&feeds, &batch.return_data);
        for failure in &decoded.failures {
            warn!("⚠️ Reserve feed {} failed to decode: {}", failure.symbol, failure.error);
        }
        metrics::increment_decode_failures("reserves", decoded.failures.len() as u64);

        let entries: Vec<ReserveEntry> = decoded
            .readings
            .into_iter()
            .map(|(feed, reading)| ReserveEntry::from_reading(&feed, reading))
            .collect();
        info!("🏦 {} reserve entries at block {}", entries.len(), batch.block_number);
        metrics::set_snapshot_entries("reserves", entries.len() as f64);

        Ok(self
            .reserves
            .publish(ReservesSnapshot::new(now_iso(), batch.block_number, entries)))
    }

    /// Last published reserve snapshot without touching the chain.
    pub fn cached_reserves(&self) -> Option<Arc<ReservesSnapshot>> {
        self.reserves.get()
    }

    /// Fresh reserve reading for one asset, matched by symbol or asset name.
    pub async fn reserve(&self, symbol: &str) -> Result<ReserveEntry, FeedError> {
        let snapshot = self.reserves_snapshot().await?;
        snapshot
            .lookup(symbol)
            .cloned()
            .ok_or_else(|| FeedError::ReserveNotFound(symbol.to_string()))
    }
}
