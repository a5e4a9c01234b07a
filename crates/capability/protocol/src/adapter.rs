//! 协议适配器能力集：connect / disconnect / read_data_points。

use crate::error::ProtocolError;
use crate::types::ProtocolKind;
use async_trait::async_trait;
use domain::{DataPoint, ValueMap};
use tokio::io::{AsyncRead, AsyncWrite};

/// 设备传输流（串口、TCP 或测试用的内存管道）。
pub trait DeviceStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> DeviceStream for T {}

/// 协议适配器
///
/// 两个协议族各有一个实现，由 [`crate::AdapterFactory`] 按设备描述选择。
/// 适配器独占其传输句柄，同一时刻只有一个调用方操作它。
#[async_trait]
pub trait ProtocolAdapter: Send {
    /// 协议族
    fn protocol(&self) -> ProtocolKind;

    /// 建立连接，失败返回 `ProtocolError::Connection`
    async fn connect(&mut self) -> Result<(), ProtocolError>;

    /// 传输是否仍可用；超时或传输错误后适配器会丢弃连接
    fn is_connected(&self) -> bool;

    /// 断开连接；重复调用是安全的
    async fn disconnect(&mut self) -> Result<(), ProtocolError>;

    /// 读取一批数据点，返回 点名 -> 值。
    ///
    /// 遇到第一个失败的点位即中止本批，错误以 `ProtocolError::Point` 携带点位名称。
    async fn read_data_points(&mut self, points: &[DataPoint]) -> Result<ValueMap, ProtocolError>;
}

/// 已装箱的适配器
pub type BoxedAdapter = Box<dyn ProtocolAdapter>;
