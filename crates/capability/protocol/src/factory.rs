//! 适配器工厂：按设备描述的协议标识选择实现。

use crate::adapter::BoxedAdapter;
use crate::error::ProtocolError;
use crate::rtu::RtuAdapter;
use crate::s7::S7Adapter;
use crate::types::{ProtocolKind, S7Settings, SerialSettings, TransportTiming};
use domain::DeviceDescriptor;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_UNIT_ID: u32 = 1;

/// 适配器工厂抽象
///
/// 只负责构造，不建立连接；协议未知或参数缺失时在此报错。
pub trait AdapterFactory: Send + Sync {
    fn create(&self, device: &DeviceDescriptor) -> Result<BoxedAdapter, ProtocolError>;
}

/// 默认工厂：Modbus RTU / S7
#[derive(Debug, Clone, Default)]
pub struct DefaultAdapterFactory {
    timing: TransportTiming,
    verify_response_crc: bool,
}

impl DefaultAdapterFactory {
    pub fn new(timing: TransportTiming) -> Self {
        Self {
            timing,
            verify_response_crc: false,
        }
    }

    /// 串口协议是否校验响应 CRC
    pub fn verify_response_crc(mut self, enabled: bool) -> Self {
        self.verify_response_crc = enabled;
        self
    }

    pub fn timing(&self) -> TransportTiming {
        self.timing
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn create(&self, device: &DeviceDescriptor) -> Result<BoxedAdapter, ProtocolError> {
        let kind: ProtocolKind = device.protocol.parse()?;
        match kind {
            ProtocolKind::SerialRegister => {
                let settings = serial_settings(device)?;
                let adapter = RtuAdapter::new(settings, self.timing)
                    .verify_response_crc(self.verify_response_crc);
                Ok(Box::new(adapter))
            }
            ProtocolKind::BlockMemory => {
                let settings = s7_settings(device)?;
                Ok(Box::new(S7Adapter::new(settings, self.timing)))
            }
        }
    }
}

/// 从设备描述提取串口参数
pub fn serial_settings(device: &DeviceDescriptor) -> Result<SerialSettings, ProtocolError> {
    let port_name = device
        .serial_port
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            ProtocolError::Config(format!("device {}: missing serialPort", device.name))
        })?;
    SerialSettings::new(
        port_name,
        device.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
        device.device_id.unwrap_or(DEFAULT_UNIT_ID),
    )
}

/// 从设备描述提取 S7 连接参数
pub fn s7_settings(device: &DeviceDescriptor) -> Result<S7Settings, ProtocolError> {
    let host = device
        .host
        .as_deref()
        .filter(|host| !host.trim().is_empty())
        .ok_or_else(|| ProtocolError::Config(format!("device {}: missing host", device.name)))?;
    let mut settings = S7Settings::new(host, device.port.unwrap_or(S7Settings::DEFAULT_PORT));
    if let Some(rack) = device.rack {
        settings.rack = rack;
    }
    if let Some(slot) = device.slot {
        settings.slot = slot;
    }
    Ok(settings)
}
