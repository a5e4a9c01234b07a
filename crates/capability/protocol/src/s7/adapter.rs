//! S7 协议适配器（ISO-on-TCP）。

use super::address::S7Address;
use super::frame;
use crate::adapter::{DeviceStream, ProtocolAdapter};
use crate::error::ProtocolError;
use crate::types::{ProtocolKind, S7Settings, TransportTiming};
use async_trait::async_trait;
use domain::{DataPoint, PointValueData, ValueMap};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

/// S7 适配器
///
/// 地址在首次读取时解析并缓存，之后的采集周期直接复用。
pub struct S7Adapter {
    settings: S7Settings,
    timing: TransportTiming,
    stream: Option<Box<dyn DeviceStream>>,
    connected: bool,
    pdu_ref: u16,
    pdu_len: u16,
    resolved: HashMap<String, S7Address>,
}

impl S7Adapter {
    /// 创建适配器（connect 时建立 TCP 连接）
    pub fn new(settings: S7Settings, timing: TransportTiming) -> Self {
        Self {
            settings,
            timing,
            stream: None,
            connected: false,
            pdu_ref: 0,
            pdu_len: frame::PREFERRED_PDU_LEN,
            resolved: HashMap::new(),
        }
    }

    /// 使用已建立的传输流创建适配器；connect 时只做 COTP / S7 握手
    pub fn with_stream(
        settings: S7Settings,
        timing: TransportTiming,
        stream: impl DeviceStream + 'static,
    ) -> Self {
        let mut adapter = Self::new(settings, timing);
        adapter.stream = Some(Box::new(stream));
        adapter
    }

    pub fn settings(&self) -> &S7Settings {
        &self.settings
    }

    /// 协商后的 PDU 长度
    pub fn pdu_len(&self) -> u16 {
        self.pdu_len
    }

    /// 读取 `address` 对应的原始字节（布尔点位读 1 字节）
    pub async fn read_address(&mut self, address: &S7Address) -> Result<Vec<u8>, ProtocolError> {
        let count = if address.is_bool { 1 } else { address.size as u16 };
        let pdu_ref = self.next_pdu_ref();
        let request = frame::build_read_var(
            pdu_ref,
            address.area.code(),
            address.db_number,
            address.byte_offset,
            count,
        );
        let response = self.exchange(&request, Some(pdu_ref)).await?;
        let bytes = frame::parse_read_var(&response)?;
        if bytes.len() != count as usize {
            return Err(ProtocolError::InvalidResponse(format!(
                "expected {} bytes, got {}",
                count,
                bytes.len()
            )));
        }
        debug!(
            area = %address.area,
            db = address.db_number,
            offset = address.byte_offset,
            bytes = ?bytes,
            "read s7 area"
        );
        Ok(bytes)
    }

    fn next_pdu_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }

    fn resolve(&mut self, address: &str) -> Result<S7Address, ProtocolError> {
        if let Some(resolved) = self.resolved.get(address) {
            return Ok(*resolved);
        }
        let resolved = S7Address::parse(address)?;
        self.resolved.insert(address.to_string(), resolved);
        Ok(resolved)
    }

    async fn read_point(&mut self, point: &DataPoint) -> Result<PointValueData, ProtocolError> {
        let address = self.resolve(&point.address)?;
        if !self.connected {
            return Err(ProtocolError::NotConnected);
        }
        let bytes = self.read_address(&address).await?;
        if address.is_bool {
            return Ok(PointValueData::Bool((bytes[0] >> address.bit_offset) & 1 == 1));
        }
        Ok(decode_value(&bytes))
    }

    /// 发送一帧并在响应超时内读回应答。
    ///
    /// 超时或传输错误后流中可能残留迟到的应答，此时丢弃传输流，
    /// 由连接管理器重建连接。
    async fn exchange(
        &mut self,
        request: &[u8],
        expected_ref: Option<u16>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let result = self.try_exchange(request, expected_ref).await;
        if let Err(e @ (ProtocolError::Timeout(_) | ProtocolError::Io(_))) = &result {
            warn!(host = %self.settings.host, error = %e, "dropping s7 stream");
            self.stream = None;
            self.connected = false;
        }
        result
    }

    /// `expected_ref` 不为空时跳过 pdu_ref 不一致的陈旧应答
    async fn try_exchange(
        &mut self,
        request: &[u8],
        expected_ref: Option<u16>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let response_timeout = self.timing.response_timeout;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        stream.write_all(request).await?;
        stream.flush().await?;

        let deadline = Instant::now() + response_timeout;
        loop {
            let frame = timeout_at(deadline, read_tpkt(stream))
                .await
                .map_err(|_| ProtocolError::Timeout(format!("no s7 response within {:?}", response_timeout)))??;
            match (expected_ref, frame::peek_pdu_ref(&frame)) {
                (Some(expected), Some(actual)) if actual != expected => {
                    debug!(expected, actual, "skipping stale s7 response");
                }
                _ => return Ok(frame),
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), ProtocolError> {
        let request = frame::build_connect_request(self.settings.rack, self.settings.slot);
        let response = self.exchange(&request, None).await?;
        frame::check_connect_confirm(&response)?;

        let pdu_ref = self.next_pdu_ref();
        let response = self.exchange(&frame::build_setup_communication(pdu_ref), Some(pdu_ref)).await?;
        self.pdu_len = frame::parse_setup_communication(&response)?;
        Ok(())
    }

    async fn open_tcp(addr: String, connect_timeout: Duration) -> Result<TcpStream, ProtocolError> {
        match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY: {}", e);
                }
                Ok(stream)
            }
            Ok(Err(e)) => Err(ProtocolError::Connection(format!(
                "failed to connect to {}: {}",
                addr, e
            ))),
            Err(_) => Err(ProtocolError::Connection(format!(
                "connection to {} timed out",
                addr
            ))),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for S7Adapter {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::BlockMemory
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.connected {
            return Ok(());
        }
        if self.stream.is_none() {
            let addr = format!("{}:{}", self.settings.host, self.settings.port);
            let stream = Self::open_tcp(addr, self.timing.connect_timeout).await?;
            self.stream = Some(Box::new(stream));
        }

        if let Err(e) = self.handshake().await {
            self.stream = None;
            return Err(ProtocolError::Connection(format!(
                "s7 handshake with {}:{} failed: {}",
                self.settings.host, self.settings.port, e
            )));
        }

        self.connected = true;
        info!(
            host = %self.settings.host,
            port = self.settings.port,
            rack = self.settings.rack,
            slot = self.settings.slot,
            pdu_len = self.pdu_len,
            "connected to s7 plc"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        self.connected = false;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(host = %self.settings.host, error = %e, "failed to shut down s7 stream");
                return Err(e.into());
            }
            info!(host = %self.settings.host, "disconnected from s7 plc");
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

async fn read_tpkt(stream: &mut Box<dyn DeviceStream>) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; frame::TPKT_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let len = frame::tpkt_frame_len(&header)?;

    let mut frame = vec![0u8; len];
    frame[..frame::TPKT_HEADER_LEN].copy_from_slice(&header);
    stream.read_exact(&mut frame[frame::TPKT_HEADER_LEN..]).await?;
    Ok(frame)
}

/// 按字节数解码：1 → u8，2 → i16 小端，4 → f32 小端，其余保留原始字节
pub(crate) fn decode_value(bytes: &[u8]) -> PointValueData {
    match bytes {
        [b] => PointValueData::I64(*b as i64),
        [b0, b1] => PointValueData::I64(i16::from_le_bytes([*b0, *b1]) as i64),
        [b0, b1, b2, b3] => PointValueData::F64(f32::from_le_bytes([*b0, *b1, *b2, *b3]) as f64),
        other => PointValueData::Bytes(other.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_value() {
        assert_eq!(decode_value(&[0xFE]), PointValueData::I64(254));
        assert_eq!(decode_value(&[0x34, 0x12]), PointValueData::I64(0x1234));
        assert_eq!(decode_value(&[0xFF, 0xFF]), PointValueData::I64(-1));
        assert_eq!(
            decode_value(&1.5f32.to_le_bytes()),
            PointValueData::F64(1.5)
        );
        assert_eq!(decode_value(&[1, 2, 3]), PointValueData::Bytes(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_unresolvable_address_fails_before_io() {
        let mut adapter = S7Adapter::new(S7Settings::new("127.0.0.1", 102), TransportTiming::default());
        let points = vec![DataPoint::new("bad", "X", domain::DataType::Int)];
        let err = adapter.read_data_points(&points).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::AddressFormat);
        assert!(matches!(err, ProtocolError::Point { ref point, .. } if point == "bad"));
    }
}
