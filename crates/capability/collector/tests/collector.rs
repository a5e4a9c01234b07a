mod common;

use common::{FakeFactory, device};
use domain::PointValueData;
use plc_collector::{ChannelSink, Collector, CollectorConfig, ConnectionManager, LogSink};
use plc_protocol::{DefaultAdapterFactory, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test(start_paused = true)]
async fn failing_device_does_not_stop_the_cycle() {
    let factory = Arc::new(FakeFactory::failing(&["second"]));
    let manager = Arc::new(ConnectionManager::new(factory.clone()));
    let (sink, mut rx) = ChannelSink::channel(8);
    let collector = Collector::new(
        vec![device("first"), device("second"), device("third")],
        manager,
        Arc::new(sink),
    );

    let report = collector.collect_all().await;
    assert!(!report.cycle_id.is_empty());
    assert_eq!(report.succeeded, vec!["first".to_string(), "third".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].device, "second");
    assert_eq!(report.failed[0].error.kind(), ErrorKind::Protocol);
    assert!(!report.is_clean());
    assert_eq!(factory.counters.reads(), 3);

    let first = rx.recv().await.expect("first snapshot");
    assert_eq!(first.device_name, "first");
    assert_eq!(first.values.len(), 2);
    assert_eq!(first.values["温度"], PointValueData::I64(1));
    let third = rx.recv().await.expect("third snapshot");
    assert_eq!(third.device_name, "third");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn misconfigured_device_is_isolated() {
    let manager = Arc::new(ConnectionManager::new(Arc::new(DefaultAdapterFactory::default())));
    let mut meter = device("meter");
    meter.protocol = "bacnet".to_string();
    let mut press = device("press");
    press.protocol = "s7".to_string();

    let collector = Collector::new(vec![meter, press], manager, Arc::new(LogSink));
    let report = collector.collect_all().await;

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].error.kind(), ErrorKind::Config);
    // press 缺少 host
    assert_eq!(report.failed[1].error.kind(), ErrorKind::Config);
}

#[tokio::test(start_paused = true)]
async fn connections_are_reused_across_cycles() {
    let factory = Arc::new(FakeFactory::default());
    let manager = Arc::new(ConnectionManager::new(factory.clone()));
    let collector = Collector::new(vec![device("a"), device("b")], manager, Arc::new(LogSink));

    for _ in 0..3 {
        assert!(collector.collect_all().await.is_clean());
    }
    assert_eq!(factory.counters.created(), 2);
    assert_eq!(factory.counters.reads(), 6);
}

#[tokio::test(start_paused = true)]
async fn run_polls_on_interval_until_shutdown() {
    let factory = Arc::new(FakeFactory::default());
    let manager = Arc::new(ConnectionManager::new(factory.clone()));
    let collector = Arc::new(Collector::with_config(
        vec![device("boiler")],
        manager,
        Arc::new(LogSink),
        CollectorConfig {
            poll_interval: Duration::from_secs(10),
        },
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let task = {
        let collector = collector.clone();
        tokio::spawn(async move { collector.run(stop_rx).await })
    };

    tokio::time::sleep(Duration::from_secs(25)).await;
    stop_tx.send(true).expect("stop");
    task.await.expect("collector task");

    assert_eq!(factory.counters.reads(), 3);
    assert_eq!(factory.counters.disconnected(), 1);
}
