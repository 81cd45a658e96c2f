//! Error kinds of the feed engine.
//!
//! Row-level (`ValidationError`) and feed-level (`DecodeError`) failures are
//! recovered where they happen and only recorded. `TransportError` aborts the
//! operation in progress. `FeedError` is what service callers see.

use serde::Serialize;
use std::time::Duration;

/// A metadata row that cannot become a `FeedDescriptor`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: {0:?}")]
    MissingFields(Vec<&'static str>),
    #[error("Invalid {field} value '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Decimals must be between 0 and 18, got {0}")]
    DecimalsOutOfRange(i64),
    #[error("Heartbeat must be positive, got {0}")]
    NonPositiveHeartbeat(i64),
    #[error("Deviation threshold must be non-negative, got {0}")]
    NegativeDeviation(f64),
    #[error("Unknown asset class: {0}")]
    UnknownAssetClass(String),
    #[error("Symbol must be a non-empty string")]
    EmptySymbol,
    #[error("Duplicate symbol {0}")]
    DuplicateSymbol(String),
    #[error("Proxy address {0} already used by another feed")]
    DuplicateAddress(String),
    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// One feed's return bytes could not be turned into a reading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty return data")]
    Empty,
    #[error("unexpected return data length {actual}, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
    #[error("abi decode failed: {0}")]
    Abi(String),
    #[error("{field} out of range")]
    OutOfRange { field: &'static str },
}

/// The chain could not be reached or answered with something unusable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("connected to chain {actual}, expected {expected}")]
    WrongChain { expected: u64, actual: u64 },
    #[error("rpc call exceeded deadline of {0:?}")]
    Timeout(Duration),
    #[error("malformed aggregate response: {0}")]
    MalformedResponse(String),
}

/// Failure kinds surfaced by the price service and query adapters.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("blockchain error: {0}")]
    Transport(#[from] TransportError),
    #[error("Price refresh already in progress")]
    RefreshInProgress,
    #[error("Feed with symbol '{0}' not found")]
    FeedNotFound(String),
    #[error("Price for symbol '{0}' not found")]
    PriceNotFound(String),
    #[error("Round {round_id} not found for symbol '{symbol}'")]
    RoundNotFound { symbol: String, round_id: String },
    #[error("Proof of Reserve data for symbol '{0}' not found")]
    ReserveNotFound(String),
    /// A best-effort read failed. Observable as not-found, kept apart so the
    /// cause is logged rather than lost.
    #[error("{what} unavailable for '{symbol}': {reason}")]
    Unavailable {
        symbol: String,
        what: &'static str,
        reason: String,
    },
    #[error("feed registry unavailable: {0}")]
    Registry(String),
}

impl FeedError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::BlockchainError,
            Self::RefreshInProgress => ErrorCode::RefreshInProgress,
            Self::FeedNotFound(_) | Self::Unavailable { .. } => ErrorCode::FeedNotFound,
            Self::PriceNotFound(_) => ErrorCode::PriceNotFound,
            Self::RoundNotFound { .. } => ErrorCode::RoundNotFound,
            Self::ReserveNotFound(_) => ErrorCode::ReserveNotFound,
            Self::Registry(_) => ErrorCode::InternalError,
        }
    }

    /// Structural and best-effort misses alike.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FeedNotFound(_)
                | Self::PriceNotFound(_)
                | Self::RoundNotFound { .. }
                | Self::ReserveNotFound(_)
                | Self::Unavailable { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FeedNotFound,
    PriceNotFound,
    RoundNotFound,
    ReserveNotFound,
    BlockchainError,
    RefreshInProgress,
    InternalError,
}
