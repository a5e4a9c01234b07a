//! Modbus RTU 协议适配器（串口）。

use super::codec::{self, FC_WRITE_SINGLE_REGISTER, MIN_RESPONSE_LEN};
use crate::adapter::{DeviceStream, ProtocolAdapter};
use crate::error::ProtocolError;
use crate::types::{ProtocolKind, SerialSettings, TransportTiming};
use async_trait::async_trait;
use domain::{DataPoint, DataType, PointValueData, ValueMap};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, StopBits,
};
use tracing::{debug, info, warn};

const RESPONSE_BUFFER_LEN: usize = 256;
/// 每次请求前最多丢弃的残留字节
const MAX_STALE_BYTES: usize = 4 * RESPONSE_BUFFER_LEN;

/// Modbus RTU 适配器：功能码 03 读保持寄存器，每个点位读 1 个寄存器。
pub struct RtuAdapter {
    settings: SerialSettings,
    timing: TransportTiming,
    verify_response_crc: bool,
    stream: Option<Box<dyn DeviceStream>>,
}

impl RtuAdapter {
    /// 创建适配器（尚未打开串口）
    pub fn new(settings: SerialSettings, timing: TransportTiming) -> Self {
        Self {
            settings,
            timing,
            verify_response_crc: false,
            stream: None,
        }
    }

    /// 使用已打开的传输流创建适配器（视为已连接）
    pub fn with_stream(
        settings: SerialSettings,
        timing: TransportTiming,
        stream: impl DeviceStream + 'static,
    ) -> Self {
        Self {
            settings,
            timing,
            verify_response_crc: false,
            stream: Some(Box::new(stream)),
        }
    }

    /// 是否校验响应帧 CRC（默认不校验）
    pub fn verify_response_crc(mut self, enabled: bool) -> Self {
        self.verify_response_crc = enabled;
        self
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// 读取单个保持寄存器
    pub async fn read_register(&mut self, address: u16) -> Result<u16, ProtocolError> {
        let request = codec::build_read_request(self.settings.unit_id(), address, 1);
        let response = self.transact(&request).await?;
        if self.verify_response_crc {
            codec::verify_checksum(&response)?;
        }
        codec::parse_read_response(&response)
    }

    /// 写单个寄存器（功能码 06）
    ///
    /// 值必须在 0-65535 之间，越界时不会向串口写入任何字节。
    pub async fn write_register(&mut self, address: u16, value: i64) -> Result<(), ProtocolError> {
        let request =
            codec::encode_write_request(self.settings.unit_id() as u32, address, value)?;
        let response = self.transact(&request).await?;
        if self.verify_response_crc {
            codec::verify_checksum(&response)?;
        }
        codec::check_response(FC_WRITE_SINGLE_REGISTER, &response)?;
        info!(
            port = %self.settings.port_name,
            unit = self.settings.unit_id(),
            register = address,
            value,
            "wrote modbus register"
        );
        Ok(())
    }

    /// 发送请求 → 固定等待 → 在超时窗口内读取完整响应帧。
    ///
    /// 无响应或传输错误时丢弃传输流：迟到的应答不能被当作下一个请求的响应。
    async fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let result = self.try_transact(request).await;
        if let Err(e @ (ProtocolError::NoResponse | ProtocolError::Io(_))) = &result {
            warn!(port = %self.settings.port_name, error = %e, "dropping serial stream");
            self.stream = None;
        }
        result
    }

    async fn try_transact(&mut self, request: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let function = request[1];
        let timing = self.timing;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;

        discard_pending(stream).await?;
        stream.write_all(request).await?;
        stream.flush().await?;
        debug!(frame = ?request, "sent rtu request");

        sleep(timing.settle_delay).await;

        let deadline = Instant::now() + timing.response_timeout;
        let mut buffer = vec![0u8; RESPONSE_BUFFER_LEN];
        let mut received = match timeout_at(deadline, stream.read(&mut buffer)).await {
            Ok(Ok(0)) | Err(_) => return Err(ProtocolError::NoResponse),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
        };

        while received < buffer.len() && !frame_complete(function, &buffer[..received]) {
            match timeout_at(deadline, stream.read(&mut buffer[received..])).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => received += n,
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        buffer.truncate(received);
        debug!(frame = ?buffer, "received rtu response");
        Ok(buffer)
    }

    async fn read_point(&mut self, point: &DataPoint) -> Result<PointValueData, ProtocolError> {
        let address = parse_register_address(&point.address)?;
        let raw = self.read_register(address).await?;
        Ok(register_value(raw, point.data_type))
    }
}

#[async_trait]
impl ProtocolAdapter for RtuAdapter {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::SerialRegister
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let port = tokio_serial::new(self.settings.port_name.as_str(), self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                ProtocolError::Connection(format!(
                    "failed to open serial port {}: {}",
                    self.settings.port_name, e
                ))
            })?;
        if let Err(e) = port.clear(ClearBuffer::All) {
            warn!(port = %self.settings.port_name, error = %e, "failed to clear serial buffers");
        }

        info!(
            port = %self.settings.port_name,
            baud = self.settings.baud_rate,
            unit = self.settings.unit_id(),
            "opened serial port"
        );
        self.stream = Some(Box::new(port));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            info!(port = %self.settings.port_name, "closed serial port");
        }
        Ok(())
    }

    async fn read_data_points(&mut self, points: &[DataPoint]) -> Result<ValueMap, ProtocolError> {
        let mut values = ValueMap::with_capacity(points.len());
        for point in points {
            let value = self
                .read_point(point)
                .await
                .map_err(|e| ProtocolError::at_point(&point.name, e))?;
            values.insert(point.name.clone(), value);
        }
        Ok(values)
    }
}

/// 丢弃线路上已到达但无人认领的字节（上一次请求的迟到应答等）
async fn discard_pending(stream: &mut Box<dyn DeviceStream>) -> Result<(), ProtocolError> {
    let mut scratch = [0u8; RESPONSE_BUFFER_LEN];
    let mut discarded = 0;
    while discarded < MAX_STALE_BYTES {
        match timeout(Duration::ZERO, stream.read(&mut scratch)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => {
                debug!(frame = ?&scratch[..n], "discarded stale rtu bytes");
                discarded += n;
            }
            Ok(Err(e)) => return Err(e.into()),
        }
    }
    Ok(())
}

fn frame_complete(function: u8, received: &[u8]) -> bool {
    match codec::expected_response_len(function, received) {
        Some(len) => received.len() >= len,
        None => received.len() >= MIN_RESPONSE_LEN,
    }
}

/// 串口点位地址为十进制寄存器号，如 "100"
fn parse_register_address(address: &str) -> Result<u16, ProtocolError> {
    let trimmed = address.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::address(address, "expected a decimal register number"));
    }
    trimmed
        .parse::<u16>()
        .map_err(|_| ProtocolError::address(address, "register number out of range"))
}

/// 按数据类型提示解释寄存器原始值
fn register_value(raw: u16, data_type: DataType) -> PointValueData {
    match data_type {
        DataType::Int => PointValueData::I64(raw as i64),
        DataType::Float => PointValueData::F64(raw as f64),
        DataType::Bool => PointValueData::Bool(raw != 0),
    }
}
