//! # Chain Transport
//!
//! The read capability the feed engine needs from the chain: the network id,
//! the head block, one batched `aggregate` round trip and one direct
//! `eth_call`. `EthersTransport` provides it over any ethers `Middleware`;
//! tests provide it in memory.

use async_trait::async_trait;
use ethers::prelude::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest};
use log::{debug, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::multicall::{AggregateResult, Call, Multicall};

#[async_trait]
pub trait ChainTransport: Send + Sync {
    async fn chain_id(&self) -> Result<u64, TransportError>;

    async fn block_number(&self) -> Result<u64, TransportError>;

    /// Executes `calls` in one round trip. `return_data[i]` answers `calls[i]`.
    async fn aggregate(&self, calls: &[Call]) -> Result<AggregateResult, TransportError>;

    async fn call(&self, target: Address, call_data: Bytes) -> Result<Bytes, TransportError>;
}

/// `ChainTransport` over an ethers provider and a Multicall3 deployment.
pub struct EthersTransport<M: Middleware> {
    provider: Arc<M>,
    multicall: Multicall<M>,
    deadline: Duration,
}

impl EthersTransport<Provider<Http>> {
    /// Connects to an HTTP endpoint and checks it serves `expected_chain_id`.
    pub async fn connect(
        http_url: &str,
        multicall_address: Address,
        expected_chain_id: u64,
        timeout_seconds: u64,
    ) -> Result<Self, TransportError> {
        let provider = Provider::<Http>::try_from(http_url)
            .map_err(|e| TransportError::Rpc(format!("invalid rpc url {}: {}", http_url, e)))?;
        let transport = Self::new(Arc::new(provider), multicall_address, timeout_seconds);
        transport.ensure_chain_id(expected_chain_id).await?;
        info!("🔗 Connected to {} (chain {})", http_url, expected_chain_id);
        Ok(transport)
    }
}

impl<M: Middleware + 'static> EthersTransport<M> {
    pub fn new(provider: Arc<M>, multicall_address: Address, timeout_seconds: u64) -> Self {
        Self {
            multicall: Multicall::new(provider.clone(), multicall_address).with_timeout(timeout_seconds),
            provider,
            deadline: Duration::from_secs(timeout_seconds),
        }
    }

    pub async fn ensure_chain_id(&self, expected: u64) -> Result<(), TransportError> {
        let actual = self.chain_id().await?;
        if actual != expected {
            return Err(TransportError::WrongChain { expected, actual });
        }
        Ok(())
    }

    async fn with_deadline<T, E, F>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| TransportError::Timeout(self.deadline))?
            .map_err(|e| TransportError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainTransport for EthersTransport<M> {
    async fn chain_id(&self) -> Result<u64, TransportError> {
        let id = self.with_deadline(self.provider.get_chainid()).await?;
        if id.bits() > 64 {
            return Err(TransportError::MalformedResponse(format!("chain id {} out of range", id)));
        }
        Ok(id.as_u64())
    }

    async fn block_number(&self) -> Result<u64, TransportError> {
        self.with_deadline(self.provider.get_block_number())
            .await
            .map(|n| n.as_u64())
    }

    async fn aggregate(&self, calls: &[Call]) -> Result<AggregateResult, TransportError> {
        debug!("aggregate: {} calls via {:?}", calls.len(), self.multicall.address());
        self.multicall.run(calls.to_vec(), None).await
    }

    async fn call(&self, target: Address, call_data: Bytes) -> Result<Bytes, TransportError> {
        let tx: TypedTransaction = TransactionRequest::new().to(target).data(call_data).into();
        self.with_deadline(self.provider.call(&tx, None)).await
    }
}
