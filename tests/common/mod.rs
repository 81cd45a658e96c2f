//! Shared fixtures: an in-memory chain and feed descriptors.

#![allow(dead_code)]

use async_trait::async_trait;
use avalanche_feeds_sdk::round_codec::{encode_round_data, AggregatorCall};
use avalanche_feeds_sdk::types::{AssetClass, ProductType};
use avalanche_feeds_sdk::{
    AggregateResult, Call, ChainTransport, FeedDescriptor, FeedRegistry, PriceService,
    RawReading, TransportError,
};
use ethers::types::{Address, Bytes, I256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Answers `aggregate` per call target from a table of encoded rounds.
/// Targets without an entry answer empty bytes.
#[derive(Default)]
pub struct MockTransport {
    pub block: Mutex<u64>,
    chain: Mutex<u64>,
    rounds: Mutex<HashMap<Address, Bytes>>,
    direct: Mutex<HashMap<(Address, Bytes), Bytes>>,
    aggregate_error: Mutex<Option<TransportError>>,
    pub aggregate_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    pub entered: Arc<Notify>,
}

impl MockTransport {
    pub fn new(block: u64) -> Self {
        Self {
            block: Mutex::new(block),
            chain: Mutex::new(43114),
            ..Default::default()
        }
    }

    /// `aggregate` waits for `gate` to be notified before answering.
    pub fn gated(block: u64, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(block)
        }
    }

    pub fn set_block(&self, block: u64) {
        *self.block.lock().unwrap() = block;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        *self.chain.lock().unwrap() = chain_id;
    }

    pub fn set_round(&self, proxy: Address, reading: RawReading) {
        self.rounds.lock().unwrap().insert(proxy, encode_round_data(&reading));
    }

    pub fn set_raw(&self, proxy: Address, data: Bytes) {
        self.rounds.lock().unwrap().insert(proxy, data);
    }

    pub fn set_direct(&self, proxy: Address, call: AggregatorCall, data: Bytes) {
        self.direct.lock().unwrap().insert((proxy, call.calldata()), data);
    }

    pub fn fail_aggregate(&self, error: Option<TransportError>) {
        *self.aggregate_error.lock().unwrap() = error;
    }
}

#[async_trait]
impl ChainTransport for MockTransport {
    async fn chain_id(&self) -> Result<u64, TransportError> {
        Ok(*self.chain.lock().unwrap())
    }

    async fn block_number(&self) -> Result<u64, TransportError> {
        Ok(*self.block.lock().unwrap())
    }

    async fn aggregate(&self, calls: &[Call]) -> Result<AggregateResult, TransportError> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(error) = self.aggregate_error.lock().unwrap().clone() {
            return Err(error);
        }
        let rounds = self.rounds.lock().unwrap();
        Ok(AggregateResult {
            block_number: *self.block.lock().unwrap(),
            return_data: calls
                .iter()
                .map(|call| rounds.get(&call.target).cloned().unwrap_or_default())
                .collect(),
        })
    }

    async fn call(&self, target: Address, call_data: Bytes) -> Result<Bytes, TransportError> {
        self.direct
            .lock()
            .unwrap()
            .get(&(target, call_data))
            .cloned()
            .ok_or_else(|| TransportError::Rpc("execution reverted".into()))
    }
}

pub fn feed(name: &str, proxy: Address, decimals: u8, product_type: ProductType) -> FeedDescriptor {
    let (base, quote) = name.split_once(" / ").unwrap_or((name, ""));
    FeedDescriptor {
        name: name.to_string(),
        symbol: avalanche_feeds_sdk::types::normalize_symbol(name),
        contract_address: proxy,
        proxy_address: proxy,
        decimals,
        deviation_threshold: 0.5,
        heartbeat: 86400,
        asset_class: AssetClass::Crypto,
        product_type,
        base_asset: base.to_string(),
        quote_asset: quote.to_string(),
    }
}

pub fn reading(round_id: u128, answer: i64, updated_at: u64) -> RawReading {
    RawReading {
        round_id,
        answer: I256::from(answer),
        started_at: updated_at - 10,
        updated_at,
        answered_in_round: round_id,
    }
}

pub fn proxy(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub async fn service(feeds: Vec<FeedDescriptor>, transport: Arc<MockTransport>) -> PriceService {
    PriceService::connect(Arc::new(FeedRegistry::from_feeds(feeds)), transport, 43114)
        .await
        .expect("mock transport serves avalanche")
}
