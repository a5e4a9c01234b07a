mod common;

use common::{FakeFactory, device};
use plc_collector::ConnectionManager;
use plc_protocol::{DefaultAdapterFactory, ErrorKind};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(300);

#[tokio::test(start_paused = true)]
async fn reuses_within_ttl_and_recreates_at_boundary() {
    let factory = Arc::new(FakeFactory::default());
    let manager = ConnectionManager::with_ttl(factory.clone(), TTL);
    let boiler = device("boiler");

    let first = manager.get_connection(&boiler).await.expect("first");
    assert_eq!(factory.counters.created(), 1);

    tokio::time::advance(TTL - Duration::from_millis(1)).await;
    let reused = manager.get_connection(&boiler).await.expect("reused");
    assert!(Arc::ptr_eq(&first, &reused));
    assert_eq!(factory.counters.created(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    let recreated = manager.get_connection(&boiler).await.expect("recreated");
    assert!(!Arc::ptr_eq(&first, &recreated));
    assert_eq!(factory.counters.created(), 2);
    assert_eq!(factory.counters.disconnected(), 1);

    let again = manager.get_connection(&boiler).await.expect("again");
    assert!(Arc::ptr_eq(&recreated, &again));
    assert_eq!(factory.counters.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn lost_connection_is_recreated_before_ttl() {
    let factory = Arc::new(FakeFactory {
        drop_link_on_failure: true,
        ..FakeFactory::failing(&["boiler"])
    });
    let manager = ConnectionManager::with_ttl(factory.clone(), TTL);
    let boiler = device("boiler");

    let first = manager.get_connection(&boiler).await.expect("first");
    assert!(first.lock().await.read_data_points(&boiler.points).await.is_err());

    let second = manager.get_connection(&boiler).await.expect("second");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(factory.counters.created(), 2);
    assert_eq!(factory.counters.disconnected(), 1);
}

#[tokio::test(start_paused = true)]
async fn devices_are_cached_independently() {
    let factory = Arc::new(FakeFactory::default());
    let manager = ConnectionManager::new(factory.clone());
    assert_eq!(manager.ttl(), ConnectionManager::DEFAULT_TTL);

    let a = manager.get_connection(&device("a")).await.expect("a");
    let b = manager.get_connection(&device("b")).await.expect("b");
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(factory.counters.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_connect_is_not_cached() {
    let factory = Arc::new(FakeFactory::default());
    factory.refuse_connect.store(true, Ordering::SeqCst);
    let manager = ConnectionManager::with_ttl(factory.clone(), TTL);
    let press = device("press");

    let err = manager.get_connection(&press).await.err().expect("refused");
    assert_eq!(err.kind(), ErrorKind::Connection);

    factory.refuse_connect.store(false, Ordering::SeqCst);
    manager.get_connection(&press).await.expect("retry");
    assert_eq!(factory.counters.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_open_one_connection() {
    let factory = Arc::new(FakeFactory {
        connect_delay: Duration::from_millis(200),
        ..FakeFactory::default()
    });
    let manager = ConnectionManager::with_ttl(factory.clone(), TTL);
    let boiler = device("boiler");

    let (first, second) = tokio::join!(manager.get_connection(&boiler), manager.get_connection(&boiler));
    let (first, second) = (first.expect("first"), second.expect("second"));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.counters.created(), 1);
}

#[tokio::test]
async fn unknown_protocol_fails_before_connecting() {
    let manager = ConnectionManager::new(Arc::new(DefaultAdapterFactory::default()));
    let mut meter = device("meter");
    meter.protocol = "bacnet".to_string();

    let err = manager.get_connection(&meter).await.err().expect("config error");
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test(start_paused = true)]
async fn shutdown_disconnects_every_adapter() {
    let factory = Arc::new(FakeFactory::default());
    let manager = ConnectionManager::with_ttl(factory.clone(), TTL);
    for name in ["a", "b", "c"] {
        manager.get_connection(&device(name)).await.expect("connect");
    }

    manager.shutdown().await;
    assert_eq!(factory.counters.disconnected(), 3);

    manager.get_connection(&device("a")).await.expect("reconnect");
    assert_eq!(factory.counters.created(), 4);
}
