//! 协议相关类型定义

use crate::error::ProtocolError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 协议族（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    /// 串口寄存器协议（Modbus RTU）
    SerialRegister,
    /// TCP 块内存协议（S7）
    BlockMemory,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SerialRegister => "serial-register",
            Self::BlockMemory => "block-memory",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial-register" | "modbus" | "modbus-rtu" => Ok(Self::SerialRegister),
            "block-memory" | "siemens-s7" | "s7" => Ok(Self::BlockMemory),
            other => Err(ProtocolError::Config(format!("unsupported protocol: {}", other))),
        }
    }
}

/// 传输等待参数
///
/// - `settle_delay`：串口发送请求后、开始读取前的固定等待
/// - `response_timeout`：等待完整响应的上限
/// - `connect_timeout`：建立 TCP 连接的上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTiming {
    pub settle_delay: Duration,
    pub response_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            response_timeout: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(5000),
        }
    }
}

/// 串口参数（Modbus RTU）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    unit_id: u8,
}

impl SerialSettings {
    /// 构造串口参数，从站地址必须在 1-247 之间。
    pub fn new(port_name: impl Into<String>, baud_rate: u32, unit_id: u32) -> Result<Self, ProtocolError> {
        Ok(Self {
            port_name: port_name.into(),
            baud_rate,
            unit_id: crate::rtu::codec::validate_unit_id(unit_id)?,
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }
}

/// S7 连接参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Settings {
    pub host: String,
    pub port: u16,
    pub rack: u8,
    pub slot: u8,
}

impl S7Settings {
    pub const DEFAULT_PORT: u16 = 102;
    pub const DEFAULT_RACK: u8 = 0;
    pub const DEFAULT_SLOT: u8 = 2;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            rack: Self::DEFAULT_RACK,
            slot: Self::DEFAULT_SLOT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_protocol_aliases() {
        assert_eq!("modbus".parse::<ProtocolKind>().unwrap(), ProtocolKind::SerialRegister);
        assert_eq!("Serial-Register".parse::<ProtocolKind>().unwrap(), ProtocolKind::SerialRegister);
        assert_eq!("siemens-s7".parse::<ProtocolKind>().unwrap(), ProtocolKind::BlockMemory);
        assert_eq!(" block-memory ".parse::<ProtocolKind>().unwrap(), ProtocolKind::BlockMemory);

        let err = "opcua".parse::<ProtocolKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_serial_settings_unit_id_range() {
        assert!(SerialSettings::new("/dev/ttyUSB0", 9600, 1).is_ok());
        assert!(SerialSettings::new("/dev/ttyUSB0", 9600, 247).is_ok());
        for bad in [0, 248, 1000] {
            let err = SerialSettings::new("/dev/ttyUSB0", 9600, bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }
}
