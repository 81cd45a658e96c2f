//! # Avalanche Feeds SDK
//!
//! Price and Proof of Reserve data from Chainlink feeds on the Avalanche
//! C-Chain, read in batches through Multicall3 and served from an in-memory
//! snapshot.
//!
//! ## Overview
//!
//! - **Registry**: feed metadata loaded once from a CSV file and validated row by row
//! - **Batching**: one `aggregate` round trip reads every feed at the same block
//! - **Decoding**: `latestRoundData()` answers decoded per feed, failures isolated
//! - **Snapshot**: the last completed cycle, swapped in atomically
//!
//! ## Architecture
//!
//! ### Read path
//! `FeedRegistry` → `round_codec` (encode) → `ChainTransport::aggregate` →
//! `round_codec` (decode) → `SnapshotStore::publish`.
//!
//! ### Serving
//! Handlers read the published snapshot and never wait on a refresh. Single
//! feed reads (`description`, `version`, `decimals`, rounds) go straight to
//! the feed proxy.

// Core Types
/// Feed metadata, readings and derived views
pub mod types;
/// Error kinds and API error codes
pub mod error;

// Chain Access
/// Chain read capability and its ethers implementation
pub mod chain_transport;
/// Multicall3 batch execution
pub mod multicall;
/// AggregatorV3 call encoding and result decoding
pub mod round_codec;

// Engine
/// CSV feed metadata loading and lookup
pub mod feed_registry;
/// Atomically published snapshots
pub mod snapshot_store;
/// Refresh orchestration and cached reads
pub mod price_service;
/// Single-feed description, version, decimals and round reads
pub mod feed_queries;
/// Proof of Reserve batch
pub mod proof_of_reserve;

// Infrastructure
/// HTTP routes
pub mod api;
/// Metrics helpers (no-ops without `observability`)
pub mod metrics;
/// Config.toml and environment settings
pub mod settings;

pub use chain_transport::{ChainTransport, EthersTransport};
pub use error::{DecodeError, ErrorCode, FeedError, TransportError, ValidationError};
pub use feed_registry::FeedRegistry;
pub use multicall::{AggregateResult, Call};
pub use price_service::{HealthReport, NetworkInfo, PriceService, RefreshOutcome};
pub use round_codec::FeedFailure;
pub use snapshot_store::{ReservesSnapshot, Snapshot, SnapshotStore};
pub use types::{FeedDescriptor, PriceEntry, RawReading, ReserveEntry};
