//! 追踪初始化、采集周期 ID 与采集指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 采集指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub device_success: u64,
    pub device_failure: u64,
    pub connections_opened: u64,
    pub connections_recycled: u64,
    pub points_read: u64,
}

/// 采集指标（进程内计数，无导出）。
pub struct TelemetryMetrics {
    cycles: AtomicU64,
    device_success: AtomicU64,
    device_failure: AtomicU64,
    connections_opened: AtomicU64,
    connections_recycled: AtomicU64,
    points_read: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            device_success: AtomicU64::new(0),
            device_failure: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            connections_recycled: AtomicU64::new(0),
            points_read: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            device_success: self.device_success.load(Ordering::Relaxed),
            device_failure: self.device_failure.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_recycled: self.connections_recycled.load(Ordering::Relaxed),
            points_read: self.points_read.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的采集周期 ID。
pub fn new_cycle_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录采集周期次数。
pub fn record_cycle() {
    metrics().cycles.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备采集成功次数及读到的点位数。
pub fn record_device_success(points: usize) {
    let metrics = metrics();
    metrics.device_success.fetch_add(1, Ordering::Relaxed);
    metrics
        .points_read
        .fetch_add(points as u64, Ordering::Relaxed);
}

/// 记录设备采集失败次数。
pub fn record_device_failure() {
    metrics().device_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录新建连接次数（含重建）。
pub fn record_connection_opened() {
    metrics().connections_opened.fetch_add(1, Ordering::Relaxed);
}

/// 记录因 TTL 到期而重建的连接次数。
pub fn record_connection_recycled() {
    metrics()
        .connections_recycled
        .fetch_add(1, Ordering::Relaxed);
}
