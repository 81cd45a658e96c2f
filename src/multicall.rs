use crate::error::TransportError;
use crate::metrics;
use crate::types::conversions::u256_to_u64;
use ethers::abi::{Function, Param, ParamType, StateMutability, Token};
use ethers::prelude::*;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// A single RPC call to be batched in a multicall.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    /// Target contract address
    pub target: Address,
    /// Encoded function call data
    pub call_data: Bytes,
}

/// Outcome of one `aggregate` round trip.
///
/// `return_data[i]` answers `calls[i]` of the request; all entries were read
/// at `block_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    pub block_number: u64,
    pub return_data: Vec<Bytes>,
}

/// Multicall3 batch executor.
///
/// Sends every call of a batch through a single `aggregate` request so the
/// whole batch is answered from one block. `aggregate` reverts as a whole if
/// any inner call reverts; such a revert surfaces as a `TransportError`.
///
/// ## Example
///
/// ```rust,ignore
/// let multicall = Multicall::new(provider, multicall_address).with_timeout(10);
/// let calls = vec![
///     Call { target: feed_proxy, call_data: latest_round_data_call },
///     // ... more calls
/// ];
/// let result = multicall.run(calls, None).await?;
/// ```
#[derive(Clone)]
pub struct Multicall<M: Middleware> {
    pub provider: Arc<M>,
    multicall_address: Address,
    timeout_seconds: u64,
}

impl<M: Middleware + 'static> Multicall<M> {
    pub fn new(provider: Arc<M>, multicall_address: Address) -> Self {
        Self {
            provider,
            multicall_address,
            timeout_seconds: 10,
        }
    }

    /// Set custom timeout for multicall operations
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn address(&self) -> Address {
        self.multicall_address
    }

    /// Runs a batch of calls, optionally at a specific block.
    pub async fn run(
        &self,
        calls: Vec<Call>,
        block: Option<BlockId>,
    ) -> Result<AggregateResult, TransportError> {
        if calls.is_empty() {
            return Ok(AggregateResult {
                block_number: 0,
                return_data: Vec::new(),
            });
        }

        metrics::record_multicall_batch_size(calls.len() as f64);
        debug!("Multicall sending {} calls", calls.len());

        let (block_number, return_data) = self.execute_aggregate(&calls, block).await?;
        if return_data.len() != calls.len() {
            return Err(TransportError::MalformedResponse(format!(
                "{} results for {} calls",
                return_data.len(),
                calls.len()
            )));
        }

        Ok(AggregateResult {
            block_number,
            return_data,
        })
    }

    async fn execute_aggregate(
        &self,
        calls: &[Call],
        block: Option<BlockId>,
    ) -> Result<(u64, Vec<Bytes>), TransportError> {
        let calldata = encode_aggregate(calls)?;

        let tx_request = ethers::types::TransactionRequest::new()
            .to(self.multicall_address)
            .data(calldata);
        let typed_tx: ethers::types::transaction::eip2718::TypedTransaction = tx_request.into();

        let deadline = Duration::from_secs(self.timeout_seconds);
        let response = tokio::time::timeout(deadline, self.provider.call(&typed_tx, block))
            .await
            .map_err(|_| TransportError::Timeout(deadline))?
            .map_err(|e| TransportError::Rpc(e.to_string()))?;

        decode_aggregate(&response)
    }
}

// function aggregate((address target, bytes callData)[] calls)
//     returns (uint256 blockNumber, bytes[] returnData)
#[allow(deprecated)]
fn aggregate_function() -> Function {
    Function {
        name: "aggregate".to_string(),
        inputs: vec![Param {
            name: "calls".to_string(),
            kind: ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::Bytes,
            ]))),
            internal_type: None,
        }],
        outputs: vec![
            Param {
                name: "blockNumber".to_string(),
                kind: ParamType::Uint(256),
                internal_type: None,
            },
            Param {
                name: "returnData".to_string(),
                kind: ParamType::Array(Box::new(ParamType::Bytes)),
                internal_type: None,
            },
        ],
        constant: None,
        state_mutability: StateMutability::Payable,
    }
}

/// ABI-encodes a Multicall3 `aggregate` call for `calls`.
pub fn encode_aggregate(calls: &[Call]) -> Result<Bytes, TransportError> {
    let call_tokens = calls
        .iter()
        .map(|call| {
            Token::Tuple(vec![
                Token::Address(call.target),
                Token::Bytes(call.call_data.to_vec()),
            ])
        })
        .collect();
    aggregate_function()
        .encode_input(&[Token::Array(call_tokens)])
        .map(Bytes::from)
        .map_err(|e| TransportError::MalformedResponse(format!("cannot encode aggregate: {}", e)))
}

/// Decodes the `(uint256, bytes[])` answer of `aggregate`.
pub fn decode_aggregate(response: &[u8]) -> Result<(u64, Vec<Bytes>), TransportError> {
    let mut decoded = ethers::abi::decode(
        &[
            ParamType::Uint(256),
            ParamType::Array(Box::new(ParamType::Bytes)),
        ],
        response,
    )
    .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

    let malformed = || TransportError::MalformedResponse("Invalid multicall response format".into());

    let return_array = decoded.pop().and_then(|t| t.into_array()).ok_or_else(malformed)?;
    let block_number = decoded
        .pop()
        .and_then(|t| t.into_uint())
        .ok_or_else(malformed)
        .and_then(|n| {
            u256_to_u64(n).map_err(|_| TransportError::MalformedResponse("block number overflow".into()))
        })?;

    let return_data = return_array
        .into_iter()
        .map(|token| token.into_bytes().map(Bytes::from).ok_or_else(malformed))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((block_number, return_data))
}
