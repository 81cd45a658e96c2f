use ethers::types::{Address, I256};
use serde::{Serialize, Serializer};

use crate::types::conversions::{i256_div_10_pow, unix_to_iso};
use crate::types::feed::FeedDescriptor;

/// Decoded `latestRoundData()` / `getRoundData()` answer of one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading {
    /// uint80 on chain
    pub round_id: u128,
    pub answer: I256,
    pub started_at: u64,
    pub updated_at: u64,
    /// uint80 on chain
    pub answered_in_round: u128,
}

impl RawReading {
    pub fn price(&self, decimals: u8) -> f64 {
        i256_div_10_pow(self.answer, decimals)
    }

    pub fn updated_at_iso(&self) -> String {
        // updated_at is bounded by the decoder, the fallback only guards direct construction
        unix_to_iso(self.updated_at).unwrap_or_default()
    }
}

// Integers travel as strings so that JS clients keep full precision.
impl Serialize for RawReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire {
            answer: String,
            started_at: String,
            updated_at: String,
            answered_in_round: String,
        }
        Wire {
            answer: self.answer.to_string(),
            started_at: self.started_at.to_string(),
            updated_at: self.updated_at.to_string(),
            answered_in_round: self.answered_in_round.to_string(),
        }
        .serialize(serializer)
    }
}

/// Human-readable price derived from one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub symbol: String,
    pub price: f64,
    pub decimals: u8,
    pub round_id: String,
    pub updated_at: String,
    pub proxy_address: Address,
    pub raw: RawReading,
}

impl PriceEntry {
    pub fn from_reading(feed: &FeedDescriptor, reading: RawReading) -> Self {
        Self {
            symbol: feed.symbol.clone(),
            price: reading.price(feed.decimals),
            decimals: feed.decimals,
            round_id: reading.round_id.to_string(),
            updated_at: reading.updated_at_iso(),
            proxy_address: feed.proxy_address,
            raw: reading,
        }
    }
}

/// Proof of Reserve reading keyed by the backing asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveEntry {
    pub symbol: String,
    pub asset: String,
    pub total_reserves: f64,
    pub decimals: u8,
    pub raw_reserves: String,
    pub updated_at: String,
    pub round_id: String,
    pub proxy_address: Address,
    pub description: String,
}

impl ReserveEntry {
    pub fn from_reading(feed: &FeedDescriptor, reading: RawReading) -> Self {
        Self {
            symbol: feed.symbol.clone(),
            asset: feed.base_asset.clone(),
            total_reserves: reading.price(feed.decimals),
            decimals: feed.decimals,
            raw_reserves: reading.answer.to_string(),
            updated_at: reading.updated_at_iso(),
            round_id: reading.round_id.to_string(),
            proxy_address: feed.proxy_address,
            description: feed.name.clone(),
        }
    }
}

/// Historical round of a feed, as returned by `getRoundData`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundData {
    pub round_id: String,
    pub answer: String,
    pub started_at: String,
    pub updated_at: String,
    pub answered_in_round: String,
    pub price: f64,
    pub decimals: u8,
    pub symbol: String,
    pub timestamp: String,
}

impl RoundData {
    pub fn from_reading(feed: &FeedDescriptor, reading: RawReading) -> Self {
        Self {
            round_id: reading.round_id.to_string(),
            answer: reading.answer.to_string(),
            started_at: reading.started_at.to_string(),
            updated_at: reading.updated_at.to_string(),
            answered_in_round: reading.answered_in_round.to_string(),
            price: reading.price(feed.decimals),
            decimals: feed.decimals,
            symbol: feed.symbol.clone(),
            timestamp: reading.updated_at_iso(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDescription {
    pub symbol: String,
    pub description: String,
    pub proxy_address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedVersion {
    pub symbol: String,
    pub version: String,
    pub proxy_address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDecimals {
    pub symbol: String,
    pub decimals: u8,
    pub proxy_address: Address,
}
