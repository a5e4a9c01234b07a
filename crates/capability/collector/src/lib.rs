//! # 采集调度模块
//!
//! ```text
//! Collector (固定间隔)
//!   └── 逐台设备：ConnectionManager::get_connection
//!         ├── 缓存命中且未过期 → 复用适配器
//!         └── 未命中 / 过期 → AdapterFactory::create → connect → 缓存
//!       → read_data_points → SnapshotSink
//! ```
//!
//! 单台设备失败只记录日志，不影响同一周期内的其他设备。

mod collector;
mod connection;
mod sink;

pub use collector::{Collector, CollectorConfig, CycleReport, DeviceFailure};
pub use connection::{ConnectionManager, SharedAdapter};
pub use sink::{ChannelSink, LogSink, SinkError, SnapshotSink};
