//! # Round Codec
//!
//! Encoding of Chainlink `AggregatorV3Interface` reads and decoding of their
//! return bytes.
//!
//! Batch decoding is positional: the i-th return payload belongs to the i-th
//! feed of the request. A payload that fails to decode becomes a per-feed
//! failure and never affects its neighbours.

use ethers::abi::{ParamType, Token};
use ethers::types::{Bytes, I256, U256};
use ethers::utils::id;
use serde::Serialize;

use crate::error::DecodeError;
use crate::multicall::Call;
use crate::types::conversions::{u256_to_u64, unix_to_iso};
use crate::types::{FeedDescriptor, RawReading};

/// Byte length of an ABI-encoded `(uint80,int256,uint256,uint256,uint80)`.
pub const ROUND_DATA_LEN: usize = 5 * 32;

const UINT80_BITS: usize = 80;

/// Read-only calls of `AggregatorV3Interface`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorCall {
    LatestRoundData,
    GetRoundData(u128),
    Decimals,
    Description,
    Version,
}

impl AggregatorCall {
    pub fn signature(&self) -> &'static str {
        match self {
            Self::LatestRoundData => "latestRoundData()",
            Self::GetRoundData(_) => "getRoundData(uint80)",
            Self::Decimals => "decimals()",
            Self::Description => "description()",
            Self::Version => "version()",
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        id(self.signature())
    }

    pub fn calldata(&self) -> Bytes {
        let mut data = self.selector().to_vec();
        if let Self::GetRoundData(round_id) = self {
            data.extend(ethers::abi::encode(&[Token::Uint(U256::from(*round_id))]));
        }
        Bytes::from(data)
    }
}

/// One `latestRoundData()` call per feed, targeting the proxy, in feed order.
pub fn encode_latest_round_calls(feeds: &[FeedDescriptor]) -> Vec<Call> {
    let call_data = AggregatorCall::LatestRoundData.calldata();
    feeds
        .iter()
        .map(|feed| Call {
            target: feed.proxy_address,
            call_data: call_data.clone(),
        })
        .collect()
}

/// Decodes `(uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)`.
pub fn decode_round_data(data: &[u8]) -> Result<RawReading, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    if data.len() != ROUND_DATA_LEN {
        return Err(DecodeError::WrongLength {
            expected: ROUND_DATA_LEN,
            actual: data.len(),
        });
    }

    let tokens = ethers::abi::decode(
        &[
            ParamType::Uint(80),
            ParamType::Int(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(80),
        ],
        data,
    )
    .map_err(|e| DecodeError::Abi(e.to_string()))?;

    let mut tokens = tokens.into_iter();
    let mut next = |field: &'static str| tokens.next().ok_or(DecodeError::OutOfRange { field });

    let round_id = uint80(next("roundId")?, "roundId")?;
    let answer = next("answer")?
        .into_int()
        .map(I256::from_raw)
        .ok_or(DecodeError::OutOfRange { field: "answer" })?;
    let started_at = timestamp(next("startedAt")?, "startedAt")?;
    let updated_at = timestamp(next("updatedAt")?, "updatedAt")?;
    let answered_in_round = uint80(next("answeredInRound")?, "answeredInRound")?;

    Ok(RawReading {
        round_id,
        answer,
        started_at,
        updated_at,
        answered_in_round,
    })
}

fn uint80(token: Token, field: &'static str) -> Result<u128, DecodeError> {
    let value = token.into_uint().ok_or(DecodeError::OutOfRange { field })?;
    if value.bits() > UINT80_BITS {
        return Err(DecodeError::OutOfRange { field });
    }
    Ok(value.as_u128())
}

// Seconds since epoch that can also be rendered as an ISO-8601 date.
fn timestamp(token: Token, field: &'static str) -> Result<u64, DecodeError> {
    let value = token
        .into_uint()
        .and_then(|v| u256_to_u64(v).ok())
        .ok_or(DecodeError::OutOfRange { field })?;
    if unix_to_iso(value).is_none() {
        return Err(DecodeError::OutOfRange { field });
    }
    Ok(value)
}

pub fn decode_string(data: &[u8]) -> Result<String, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    ethers::abi::decode(&[ParamType::String], data)
        .map_err(|e| DecodeError::Abi(e.to_string()))?
        .into_iter()
        .next()
        .and_then(Token::into_string)
        .ok_or_else(|| DecodeError::Abi("expected string".into()))
}

pub fn decode_uint(data: &[u8]) -> Result<U256, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    ethers::abi::decode(&[ParamType::Uint(256)], data)
        .map_err(|e| DecodeError::Abi(e.to_string()))?
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| DecodeError::Abi("expected uint".into()))
}

pub fn decode_u8(data: &[u8]) -> Result<u8, DecodeError> {
    let value = decode_uint(data)?;
    if value.bits() > 8 {
        return Err(DecodeError::OutOfRange { field: "decimals" });
    }
    Ok(value.low_u32() as u8)
}

/// A feed left out of a batch, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFailure {
    pub symbol: String,
    pub error: String,
}

/// Readings of one batch, split by outcome. Successes keep feed order.
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    pub readings: Vec<(FeedDescriptor, RawReading)>,
    pub failures: Vec<FeedFailure>,
}

/// Decodes `results[i]` against `feeds[i]`.
///
/// A feed without a matching result is recorded as a failure; results beyond
/// the feed list are ignored.
pub fn decode_batch(feeds: &[FeedDescriptor], results: &[Bytes]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();
    for (index, feed) in feeds.iter().enumerate() {
        let decoded = results
            .get(index)
            .ok_or(DecodeError::Empty)
            .and_then(|data| decode_round_data(data));
        match decoded {
            Ok(reading) => batch.readings.push((feed.clone(), reading)),
            Err(e) => batch.failures.push(FeedFailure {
                symbol: feed.symbol.clone(),
                error: e.to_string(),
            }),
        }
    }
    batch
}

/// ABI-encodes a round in the `latestRoundData()` return layout.
pub fn encode_round_data(reading: &RawReading) -> Bytes {
    Bytes::from(ethers::abi::encode(&[
        Token::Uint(U256::from(reading.round_id)),
        Token::Int(reading.answer.into_raw()),
        Token::Uint(U256::from(reading.started_at)),
        Token::Uint(U256::from(reading.updated_at)),
        Token::Uint(U256::from(reading.answered_in_round)),
    ]))
}
