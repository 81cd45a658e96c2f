//! # Price Service
//!
//! Owns the feed registry, the chain transport and the published snapshots,
//! and drives refresh cycles. One instance lives for the whole process and is
//! shared by handle; there is no global state.
//!
//! ## Refresh cycle
//!
//! 1. Claim the refresh flag with a compare-and-set, or fail with
//!    `FeedError::RefreshInProgress`.
//! 2. Encode one `latestRoundData()` call per registered feed.
//! 3. Execute the whole batch in a single `aggregate` round trip. A transport
//!    failure ends the cycle here and the previous snapshot stays published.
//! 4. Decode every result independently. Feeds that fail to decode are
//!    recorded and left out.
//! 5. Publish the new snapshot in one swap and release the flag.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::chain_transport::ChainTransport;
use crate::error::{FeedError, TransportError};
use crate::feed_registry::FeedRegistry;
use crate::metrics;
use crate::round_codec::{decode_batch, encode_latest_round_calls, FeedFailure};
use crate::snapshot_store::{ReservesSnapshot, Snapshot, SnapshotStore};
use crate::types::conversions::now_iso;
use crate::types::{FeedDescriptor, PriceEntry};

/// Avalanche C-Chain.
pub const AVALANCHE_CHAIN_ID: u64 = 43114;

/// Summary of one completed refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub total_feeds: usize,
    pub success_count: usize,
    pub failures: Vec<FeedFailure>,
    pub duration_ms: u64,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub block_number: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedsHealth {
    pub total: usize,
    pub with_prices: usize,
    pub last_refresh: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: f64,
    #[serde(rename = "avalanche")]
    pub network: NetworkInfo,
    pub feeds: FeedsHealth,
}

/// Clears the refresh flag on every exit path of a cycle.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PriceService {
    pub(crate) registry: Arc<FeedRegistry>,
    pub(crate) transport: Arc<dyn ChainTransport>,
    prices: SnapshotStore<Snapshot>,
    pub(crate) reserves: SnapshotStore<ReservesSnapshot>,
    refresh_in_progress: AtomicBool,
    chain_id: u64,
    started: Instant,
}

impl PriceService {
    /// Builds the service after checking `transport` serves `expected_chain_id`.
    pub async fn connect(
        registry: Arc<FeedRegistry>,
        transport: Arc<dyn ChainTransport>,
        expected_chain_id: u64,
    ) -> Result<Self, FeedError> {
        let actual = transport.chain_id().await?;
        if actual != expected_chain_id {
            warn!("❌ Transport serves chain {}, expected {}", actual, expected_chain_id);
            return Err(TransportError::WrongChain {
                expected: expected_chain_id,
                actual,
            }
            .into());
        }
        Ok(Self {
            registry,
            transport,
            prices: SnapshotStore::new(),
            reserves: SnapshotStore::new(),
            refresh_in_progress: AtomicBool::new(false),
            chain_id: expected_chain_id,
            started: Instant::now(),
        })
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_progress.load(Ordering::Acquire)
    }

    /// Runs one refresh cycle over every registered feed.
    pub async fn refresh(&self) -> Result<RefreshOutcome, FeedError> {
        self.refresh_cycle().await.map(|(outcome, _)| outcome)
    }

    async fn refresh_cycle(&self) -> Result<(RefreshOutcome, Arc<Snapshot>), FeedError> {
        let start = Instant::now();
        let _guard = match RefreshGuard::acquire(&self.refresh_in_progress) {
            Some(guard) => guard,
            None => {
                metrics::increment_refresh("conflict");
                return Err(FeedError::RefreshInProgress);
            }
        };

        let feeds = self.registry.all();
        info!("🔄 Refreshing {} feeds", feeds.len());

        let calls = encode_latest_round_calls(feeds);
        let batch = match self.transport.aggregate(&calls).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("❌ Refresh aborted, keeping previous snapshot: {}", e);
                metrics::increment_refresh("transport_error");
                return Err(e.into());
            }
        };
        // aggregate answers nothing for an empty batch
        let block_number = if calls.is_empty() {
            self.transport.block_number().await?
        } else {
            batch.block_number
        };

        let decoded = decode_batch(feeds, &batch.return_data);
        for failure in &decoded.failures {
            warn!("⚠️ Feed {} failed to decode: {}", failure.symbol, failure.error);
        }
        metrics::increment_decode_failures("prices", decoded.failures.len() as u64);

        let entries: Vec<PriceEntry> = decoded
            .readings
            .into_iter()
            .map(|(feed, reading)| PriceEntry::from_reading(&feed, reading))
            .collect();
        let success_count = entries.len();

        let snapshot = self.prices.publish(Snapshot {
            entries,
            block_number,
            completed_at: now_iso(),
            failures: decoded.failures,
        });

        let duration = start.elapsed();
        metrics::increment_refresh("success");
        metrics::record_refresh_duration(duration);
        metrics::set_snapshot_entries("prices", success_count as f64);
        metrics::set_snapshot_block_number(block_number);
        info!(
            "✅ Refresh complete: {}/{} feeds at block {} in {}ms",
            success_count,
            feeds.len(),
            block_number,
            duration.as_millis()
        );

        let outcome = RefreshOutcome {
            total_feeds: feeds.len(),
            success_count,
            failures: snapshot.failures.clone(),
            duration_ms: duration.as_millis() as u64,
            block_number,
        };
        Ok((outcome, snapshot))
    }

    /// The published snapshot, `None` before the first successful refresh.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.prices.get()
    }

    /// Current prices, running one refresh first when nothing is cached.
    pub async fn prices_or_refresh(&self) -> Result<Arc<Snapshot>, FeedError> {
        if let Some(snapshot) = self.prices.get().filter(|s| !s.is_empty()) {
            return Ok(snapshot);
        }
        debug!("No prices cached, refreshing before serving");
        let (_, snapshot) = self.refresh_cycle().await?;
        Ok(snapshot)
    }

    /// Cached price of one feed. Never touches the chain.
    pub fn price(&self, symbol: &str) -> Result<PriceEntry, FeedError> {
        self.prices
            .lookup(symbol)
            .ok_or_else(|| FeedError::PriceNotFound(symbol.to_string()))
    }

    pub fn feeds(&self) -> &[FeedDescriptor] {
        self.registry.all()
    }

    pub fn feed(&self, identifier: &str) -> Result<&FeedDescriptor, FeedError> {
        self.registry
            .lookup(identifier)
            .ok_or_else(|| FeedError::FeedNotFound(identifier.to_string()))
    }

    pub fn last_refresh(&self) -> Option<String> {
        self.prices.get().map(|s| s.completed_at.clone())
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Chain id and head block as the transport reports them right now.
    pub async fn network_info(&self) -> NetworkInfo {
        let head = match self.transport.chain_id().await {
            Ok(chain_id) => self
                .transport
                .block_number()
                .await
                .map(|block| (chain_id, block)),
            Err(e) => Err(e),
        };
        match head {
            Ok((chain_id, block)) => NetworkInfo {
                chain_id,
                block_number: Some(block.to_string()),
                connected: true,
            },
            Err(e) => {
                warn!("Network info unavailable: {}", e);
                NetworkInfo {
                    chain_id: self.chain_id,
                    block_number: None,
                    connected: false,
                }
            }
        }
    }

    pub async fn health(&self) -> HealthReport {
        let with_prices = self.prices.get().map_or(0, |s| s.entries.len());
        HealthReport {
            status: if with_prices > 0 { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            uptime: self.uptime_seconds(),
            network: self.network_info().await,
            feeds: FeedsHealth {
                total: self.registry.len(),
                with_prices,
                last_refresh: self.last_refresh(),
            },
        }
    }
}
