//! 协议错误类型定义

/// 错误分类，供调用方按类别处理（连接 / 配置 / 地址 / 协议 / 校验）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Config,
    AddressFormat,
    Protocol,
    Validation,
}

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 传输通道无法建立
    #[error("connection error: {0}")]
    Connection(String),

    /// 协议标识未知或缺少传输参数
    #[error("config error: {0}")]
    Config(String),

    /// 地址格式错误（在任何 IO 之前报出）
    #[error("invalid address '{address}': {reason}")]
    AddressFormat { address: String, reason: String },

    /// 数值越界（从站地址、寄存器值）
    #[error("validation error: {0}")]
    Validation(String),

    /// 设备返回异常码
    #[error("device exception: function 0x{function:02X}, code {code}")]
    Exception { function: u8, code: u8 },

    /// 响应过短、功能码不匹配、校验失败等
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// 等待窗口内未收到任何字节
    #[error("no response from device")]
    NoResponse,

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 尚未调用 connect 或已断开
    #[error("not connected")]
    NotConnected,

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 单点读取失败（携带点位名称）
    #[error("read point [{point}] failed: {source}")]
    Point {
        point: String,
        #[source]
        source: Box<ProtocolError>,
    },
}

impl ProtocolError {
    pub(crate) fn address(address: &str, reason: impl Into<String>) -> Self {
        Self::AddressFormat {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// 用点位名称包装错误。
    pub fn at_point(point: &str, source: ProtocolError) -> Self {
        Self::Point {
            point: point.to_string(),
            source: Box::new(source),
        }
    }

    /// 错误类别；点位包装透传内部错误的类别。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Config(_) => ErrorKind::Config,
            Self::AddressFormat { .. } => ErrorKind::AddressFormat,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Point { source, .. } => source.kind(),
            Self::Exception { .. }
            | Self::InvalidResponse(_)
            | Self::NoResponse
            | Self::Timeout(_)
            | Self::NotConnected
            | Self::Io(_) => ErrorKind::Protocol,
        }
    }

    /// 去掉点位包装后的根错误。
    pub fn root(&self) -> &ProtocolError {
        match self {
            Self::Point { source, .. } => source.root(),
            other => other,
        }
    }
}
