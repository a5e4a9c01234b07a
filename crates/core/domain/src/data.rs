use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 点位值的数据类型。
///
/// 序列化为裸值（整数 / 浮点 / 布尔 / 字节数组），下游无需解析标签。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValueData {
    I64(i64),
    F64(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

/// 点名 -> 值 的映射。
pub type ValueMap = HashMap<String, PointValueData>;

/// 单台设备一次采集的结果（交给下游缓存/推送）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub device_name: String,
    pub values: ValueMap,
    pub timestamp_ms: i64,
}

impl DeviceSnapshot {
    pub fn new(device_name: impl Into<String>, values: ValueMap) -> Self {
        Self {
            device_name: device_name.into(),
            values,
            timestamp_ms: now_epoch_ms(),
        }
    }
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
