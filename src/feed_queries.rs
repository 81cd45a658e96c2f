//! Best-effort single reads against one feed's proxy.
//!
//! These bypass the snapshot and the batch path. An unknown feed is
//! `FeedError::FeedNotFound`; a failed read or undecodable answer is
//! `FeedError::Unavailable`. Both are not-found to callers.

use ethers::types::Bytes;
use log::{debug, warn};

use crate::error::{DecodeError, FeedError};
use crate::metrics;
use crate::price_service::PriceService;
use crate::round_codec::{decode_round_data, decode_string, decode_u8, decode_uint, AggregatorCall};
use crate::types::{FeedDecimals, FeedDescription, FeedDescriptor, FeedVersion, RoundData};

const UINT80_MAX: u128 = (1u128 << 80) - 1;

impl PriceService {
    pub async fn describe(&self, symbol: &str) -> Result<FeedDescription, FeedError> {
        let feed = self.feed(symbol)?;
        let description = self
            .read(feed, AggregatorCall::Description, "description", |d| decode_string(d))
            .await?;
        Ok(FeedDescription {
            symbol: feed.symbol.clone(),
            description,
            proxy_address: feed.proxy_address,
        })
    }

    pub async fn version(&self, symbol: &str) -> Result<FeedVersion, FeedError> {
        let feed = self.feed(symbol)?;
        let version = self
            .read(feed, AggregatorCall::Version, "version", |d| decode_uint(d))
            .await?;
        Ok(FeedVersion {
            symbol: feed.symbol.clone(),
            version: version.to_string(),
            proxy_address: feed.proxy_address,
        })
    }

    /// Decimals as reported by the contract, not the metadata file.
    pub async fn decimals_of(&self, symbol: &str) -> Result<FeedDecimals, FeedError> {
        let feed = self.feed(symbol)?;
        let decimals = self
            .read(feed, AggregatorCall::Decimals, "decimals", |d| decode_u8(d))
            .await?;
        Ok(FeedDecimals {
            symbol: feed.symbol.clone(),
            decimals,
            proxy_address: feed.proxy_address,
        })
    }

    /// Historical round of a feed. `round_id` is a decimal uint80.
    pub async fn round_data(&self, symbol: &str, round_id: &str) -> Result<RoundData, FeedError> {
        let feed = self.feed(symbol)?;
        let not_found = || FeedError::RoundNotFound {
            symbol: feed.symbol.clone(),
            round_id: round_id.to_string(),
        };

        let id = round_id
            .trim()
            .parse::<u128>()
            .ok()
            .filter(|id| *id <= UINT80_MAX)
            .ok_or_else(not_found)?;

        let reading = self
            .read(feed, AggregatorCall::GetRoundData(id), "round", |d| decode_round_data(d))
            .await
            .map_err(|e| {
                debug!("round {} of {}: {}", round_id, feed.symbol, e);
                not_found()
            })?;
        Ok(RoundData::from_reading(feed, reading))
    }

    async fn read<T>(
        &self,
        feed: &FeedDescriptor,
        call: AggregatorCall,
        what: &'static str,
        decode: impl FnOnce(&Bytes) -> Result<T, DecodeError>,
    ) -> Result<T, FeedError> {
        let unavailable = |reason: String| {
            warn!("{} read failed for {}: {}", what, feed.symbol, reason);
            metrics::increment_query_failures(what);
            FeedError::Unavailable {
                symbol: feed.symbol.clone(),
                what,
                reason,
            }
        };

        let data = self
            .transport
            .call(feed.proxy_address, call.calldata())
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        decode(&data).map_err(|e| unavailable(e.to_string()))
    }
}
