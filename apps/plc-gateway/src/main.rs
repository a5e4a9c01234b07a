//! 现场设备采集网关：加载设备描述，按固定间隔轮询，Ctrl-C 退出。

use plc_collector::{Collector, CollectorConfig, ConnectionManager, LogSink};
use plc_config::{AppConfig, load_devices};
use plc_protocol::{DefaultAdapterFactory, TransportTiming};
use plc_telemetry::init_tracing;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 设备描述（plc-config.yml / *.json）
    let devices = load_devices(&config.devices_file)?;
    if devices.is_empty() {
        warn!(path = %config.devices_file.display(), "no devices configured");
    }

    // 串口等待/超时与 TCP 连接超时
    let timing = TransportTiming {
        settle_delay: config.settle_delay(),
        response_timeout: config.response_timeout(),
        connect_timeout: config.connect_timeout(),
    };
    let factory = DefaultAdapterFactory::new(timing).verify_response_crc(config.verify_response_crc);
    let connections = Arc::new(ConnectionManager::with_ttl(
        Arc::new(factory),
        config.connection_ttl(),
    ));
    let collector = Collector::with_config(
        devices,
        connections,
        Arc::new(LogSink),
        CollectorConfig {
            poll_interval: config.poll_interval(),
        },
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(err) => warn!("failed to listen for ctrl-c: {}", err),
        }
        let _ = stop_tx.send(true);
    });

    collector.run(stop_rx).await;

    let metrics = plc_telemetry::metrics().snapshot();
    info!(
        cycles = metrics.cycles,
        device_success = metrics.device_success,
        device_failure = metrics.device_failure,
        connections_opened = metrics.connections_opened,
        "gateway stopped"
    );
    Ok(())
}
