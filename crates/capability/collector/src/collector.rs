//! 周期采集调度。

use crate::connection::ConnectionManager;
use crate::sink::SnapshotSink;
use domain::{DeviceDescriptor, DeviceSnapshot};
use plc_protocol::ProtocolError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{Instrument, info, info_span, warn};

/// 采集调度参数。
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 两次采集周期之间的间隔（上一周期结束后开始计时）
    pub poll_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// 单台设备的采集失败。
#[derive(Debug)]
pub struct DeviceFailure {
    pub device: String,
    pub error: ProtocolError,
}

/// 一个采集周期的结果。
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle_id: String,
    /// 采集成功的设备（按配置顺序）
    pub succeeded: Vec<String>,
    pub failed: Vec<DeviceFailure>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 采集器：按固定间隔逐台轮询设备。
pub struct Collector {
    devices: Vec<DeviceDescriptor>,
    connections: Arc<ConnectionManager>,
    sink: Arc<dyn SnapshotSink>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(
        devices: Vec<DeviceDescriptor>,
        connections: Arc<ConnectionManager>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        Self::with_config(devices, connections, sink, CollectorConfig::default())
    }

    pub fn with_config(
        devices: Vec<DeviceDescriptor>,
        connections: Arc<ConnectionManager>,
        sink: Arc<dyn SnapshotSink>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            devices,
            connections,
            sink,
            config,
        }
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// 执行一个采集周期；单台设备失败不会中断其余设备。
    pub async fn collect_all(&self) -> CycleReport {
        let cycle_id = plc_telemetry::new_cycle_id();
        let span = info_span!("poll_cycle", cycle_id = %cycle_id);
        let mut report = CycleReport {
            cycle_id,
            ..CycleReport::default()
        };

        async {
            for device in &self.devices {
                match self.collect_device(device).await {
                    Ok(snapshot) => {
                        let points = snapshot.values.len();
                        plc_telemetry::record_device_success(points);
                        info!(target: "plc.collector", device = %device.name, points, "device collected");
                        if let Err(err) = self.sink.publish(snapshot).await {
                            warn!(target: "plc.collector", device = %device.name, error = %err, "failed to publish snapshot");
                        }
                        report.succeeded.push(device.name.clone());
                    }
                    Err(err) => {
                        plc_telemetry::record_device_failure();
                        warn!(target: "plc.collector", device = %device.name, error = %err, "device collection failed");
                        report.failed.push(DeviceFailure {
                            device: device.name.clone(),
                            error: err,
                        });
                    }
                }
            }
            plc_telemetry::record_cycle();
            info!(
                target: "plc.collector",
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "poll cycle finished"
            );
        }
        .instrument(span)
        .await;

        report
    }

    async fn collect_device(&self, device: &DeviceDescriptor) -> Result<DeviceSnapshot, ProtocolError> {
        let adapter = self.connections.get_connection(device).await?;
        let mut adapter = adapter.lock().await;
        let values = adapter.read_data_points(&device.points).await?;
        Ok(DeviceSnapshot::new(device.name.as_str(), values))
    }

    /// 循环采集直到收到停止信号，退出前断开所有连接。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target: "plc.collector",
            devices = self.devices.len(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "collector started"
        );

        while !*shutdown.borrow() {
            self.collect_all().await;

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.connections.shutdown().await;
        info!(target: "plc.collector", "collector stopped");
    }
}
