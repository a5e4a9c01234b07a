//! 设备与点位描述。
//!
//! 由配置文件加载，加载后不可变。字段命名与 `plc-config.yml` 保持一致（camelCase）。

use serde::{Deserialize, Serialize};

/// 点位数据类型提示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    #[default]
    Int,
    Float,
    Bool,
}

/// 数据采集点定义。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    /// 点位名称（设备内唯一），如 "温度"
    pub name: String,
    /// 原始地址，如 "DB1.DBW0"、"I1.0" 或 "100"
    pub address: String,
    /// 数据类型提示
    #[serde(default)]
    pub data_type: DataType,
}

impl DataPoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            data_type,
        }
    }
}

/// 设备描述：协议标识、传输参数与有序点位列表。
///
/// 传输参数按协议取用：串口协议使用 `serial_port`/`baud_rate`/`device_id`，
/// 块内存协议使用 `host`/`port`/`rack`/`slot`。缺失的必填参数由适配器工厂报错。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// 设备名称（全局唯一，连接缓存键）
    pub name: String,
    /// 协议标识：serial-register / block-memory（及其别名）
    pub protocol: String,
    /// TCP 主机地址
    #[serde(default)]
    pub host: Option<String>,
    /// TCP 端口
    #[serde(default)]
    pub port: Option<u16>,
    /// 串口名称（Linux: "/dev/ttyUSB0"，Windows: "COM4"）
    #[serde(default)]
    pub serial_port: Option<String>,
    /// 波特率
    #[serde(default)]
    pub baud_rate: Option<u32>,
    /// 从站地址（1-247）
    #[serde(default, alias = "unitId")]
    pub device_id: Option<u32>,
    /// 机架号（S7）
    #[serde(default)]
    pub rack: Option<u8>,
    /// 槽号（S7）
    #[serde(default)]
    pub slot: Option<u8>,
    /// 采集点列表
    #[serde(default)]
    pub points: Vec<DataPoint>,
}

impl DeviceDescriptor {
    /// 构造仅含名称与协议的描述，传输参数通过 builder 方法补齐。
    pub fn new(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            host: None,
            port: None,
            serial_port: None,
            baud_rate: None,
            device_id: None,
            rack: None,
            slot: None,
            points: Vec::new(),
        }
    }

    pub fn with_serial(mut self, serial_port: impl Into<String>, baud_rate: u32, device_id: u32) -> Self {
        self.serial_port = Some(serial_port.into());
        self.baud_rate = Some(baud_rate);
        self.device_id = Some(device_id);
        self
    }

    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_point(mut self, point: DataPoint) -> Self {
        self.points.push(point);
        self
    }
}
