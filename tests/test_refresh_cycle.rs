//! Integration tests for the refresh cycle
//!
//! Drives `PriceService` against an in-memory chain: partial decode failures,
//! transport failures, and the single-flight guard.

mod common;

use avalanche_feeds_sdk::price_service::AVALANCHE_CHAIN_ID;
use avalanche_feeds_sdk::types::ProductType;
use avalanche_feeds_sdk::{FeedError, FeedRegistry, PriceService, TransportError};
use common::{feed, proxy, reading, service, MockTransport};
use ethers::types::Bytes;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::test]
async fn test_refresh_publishes_successes_and_records_failures() {
    let transport = Arc::new(MockTransport::new(41_234_567));
    transport.set_round(proxy(1), reading(18446744073709552001, 250_000_000_000, 1_700_000_000));
    transport.set_raw(proxy(2), Bytes::from(vec![0u8; 12]));

    let service = service(
        vec![
            feed("BTC / USD", proxy(1), 8, ProductType::PriceFeed),
            feed("ETH / USD", proxy(2), 8, ProductType::PriceFeed),
        ],
        transport.clone(),
    ).await;

    let outcome = service.refresh().await.expect("refresh should succeed");
    assert_eq!(outcome.total_feeds, 2);
    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.block_number, 41_234_567);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].symbol, "ETHUSD");

    let snapshot = service.snapshot().expect("snapshot published");
    assert_eq!(snapshot.block_number, 41_234_567);
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.failures[0].symbol, "ETHUSD");

    let btc = service.price("btc/usd").unwrap();
    assert!((btc.price - 2500.0).abs() < 1e-9);
    assert_eq!(btc.round_id, "18446744073709552001");
    assert_eq!(btc.updated_at, "2023-11-14T22:13:20+00:00");
    assert!(matches!(service.price("ETHUSD"), Err(FeedError::PriceNotFound(_))));
}

#[tokio::test]
async fn test_transport_failure_keeps_previous_snapshot() {
    let transport = Arc::new(MockTransport::new(100));
    transport.set_round(proxy(1), reading(1, 250_000_000_000, 1_700_000_000));
    let service = service(vec![feed("BTC / USD", proxy(1), 8, ProductType::PriceFeed)], transport.clone()).await;

    service.refresh().await.unwrap();

    transport.set_block(101);
    transport.set_round(proxy(1), reading(2, 260_000_000_000, 1_700_000_600));
    transport.fail_aggregate(Some(TransportError::Rpc("connection refused".into())));

    let err = service.refresh().await.unwrap_err();
    assert!(matches!(err, FeedError::Transport(TransportError::Rpc(_))));

    let snapshot = service.snapshot().unwrap();
    assert_eq!(snapshot.block_number, 100);
    let btc = service.price("BTCUSD").unwrap();
    assert_eq!(btc.round_id, "1");
    assert!((btc.price - 2500.0).abs() < 1e-9);

    // the guard was released by the failed cycle
    transport.fail_aggregate(None);
    let outcome = service.refresh().await.unwrap();
    assert_eq!(outcome.block_number, 101);
    assert_eq!(service.price("BTCUSD").unwrap().round_id, "2");
}

#[tokio::test]
async fn test_concurrent_refresh_is_rejected() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(MockTransport::gated(500, gate.clone()));
    transport.set_round(proxy(1), reading(9, 100_000_000, 1_700_000_000));
    let service = Arc::new(service(
        vec![feed("AVAX / USD", proxy(1), 8, ProductType::PriceFeed)],
        transport.clone(),
    ).await);

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.refresh().await })
    };
    transport.entered.notified().await;
    assert!(service.is_refreshing());

    let second = service.refresh().await;
    assert!(matches!(second, Err(FeedError::RefreshInProgress)));
    assert!(service.snapshot().is_none());

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.success_count, 1);

    assert!(!service.is_refreshing());
    assert_eq!(transport.aggregate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.snapshot().unwrap().block_number, 500);
}

#[tokio::test]
async fn test_many_callers_admit_one_cycle() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(MockTransport::gated(7, gate.clone()));
    transport.set_round(proxy(1), reading(1, 1, 1_700_000_000));
    let service = service(vec![feed("AVAX / USD", proxy(1), 8, ProductType::PriceFeed)], transport.clone()).await;

    let release = async {
        transport.entered.notified().await;
        tokio::task::yield_now().await;
        gate.notify_one();
    };
    let refreshes = futures::future::join_all((0..8).map(|_| service.refresh()));
    let (results, _) = futures::future::join(refreshes, release).await;

    let completed = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(FeedError::RefreshInProgress)))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(transport.aggregate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prices_or_refresh_fills_empty_cache() {
    let transport = Arc::new(MockTransport::new(42));
    transport.set_round(proxy(3), reading(5, 3_000_000_000_000_000_000, 1_700_000_000));
    let service = service(vec![feed("ETH / USD", proxy(3), 18, ProductType::PriceFeed)], transport.clone()).await;

    assert!(service.snapshot().is_none());
    let snapshot = service.prices_or_refresh().await.unwrap();
    assert_eq!(snapshot.block_number, 42);
    assert!((snapshot.entries[0].price - 3.0).abs() < 1e-12);

    // a populated cache is served as is
    service.prices_or_refresh().await.unwrap();
    assert_eq!(transport.aggregate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_registry_publishes_empty_snapshot() {
    let transport = Arc::new(MockTransport::new(77));
    let service = service(Vec::new(), transport).await;

    let outcome = service.refresh().await.unwrap();
    assert_eq!(outcome.success_count, 0);
    assert_eq!(outcome.block_number, 77);
    assert!(service.snapshot().unwrap().is_empty());
    assert_eq!(service.health().await.status, "unhealthy");
}

#[tokio::test]
async fn test_health_reports_feeds_and_network() {
    let transport = Arc::new(MockTransport::new(900));
    transport.set_round(proxy(1), reading(1, 250_000_000_000, 1_700_000_000));
    let service = service(
        vec![
            feed("BTC / USD", proxy(1), 8, ProductType::PriceFeed),
            feed("ETH / USD", proxy(2), 8, ProductType::PriceFeed),
        ],
        transport,
    ).await;
    assert_eq!(service.health().await.status, "unhealthy");

    service.refresh().await.unwrap();
    let health = service.health().await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.feeds.total, 2);
    assert_eq!(health.feeds.with_prices, 1);
    assert!(health.feeds.last_refresh.is_some());
    assert_eq!(health.network.chain_id, 43114);
    assert_eq!(health.network.block_number.as_deref(), Some("900"));
    assert!(health.network.connected);
}

#[tokio::test]
async fn test_connect_rejects_wrong_chain() {
    let transport = Arc::new(MockTransport::new(5));
    transport.set_chain_id(1);
    let registry = Arc::new(FeedRegistry::from_feeds(vec![feed(
        "BTC / USD",
        proxy(1),
        8,
        ProductType::PriceFeed,
    )]));

    let err = PriceService::connect(registry, transport.clone(), AVALANCHE_CHAIN_ID)
        .await
        .err()
        .expect("chain 1 must be rejected");
    assert!(matches!(
        err,
        FeedError::Transport(TransportError::WrongChain { expected: 43114, actual: 1 })
    ));
    assert_eq!(transport.aggregate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_network_info_reports_transport_chain() {
    let transport = Arc::new(MockTransport::new(5));
    let service = service(Vec::new(), transport.clone()).await;
    assert_eq!(service.network_info().await.chain_id, 43114);

    transport.set_chain_id(1);
    let info = service.network_info().await;
    assert_eq!(info.chain_id, 1);
    assert_eq!(info.block_number.as_deref(), Some("5"));
}

#[tokio::test]
async fn test_prices_or_refresh_returns_published_empty_snapshot() {
    let transport = Arc::new(MockTransport::new(64));
    let service = service(Vec::new(), transport).await;

    let snapshot = service.prices_or_refresh().await.unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.block_number, 64);
    assert!(Arc::ptr_eq(&snapshot, &service.snapshot().unwrap()));
}
