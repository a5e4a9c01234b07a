//! # 现场协议适配模块
//!
//! 把两种互不兼容的现场协议收敛到同一个轮询接口之后：
//! - **Modbus RTU**（串口寄存器协议）：8 字节请求帧 + CRC16，读 03 / 写 06
//! - **S7**（TCP 块内存协议）：I/Q/M 位地址与 DB 块地址，按字节读取
//!
//! ## 架构设计
//!
//! ```text
//! DeviceDescriptor (protocol + 传输参数 + points)
//!       │
//!       ▼
//! AdapterFactory ──┬── RtuAdapter  (tokio-serial)
//!                  └── S7Adapter   (TcpStream, TPKT/COTP/S7)
//!       │
//!       ▼
//! ProtocolAdapter::read_data_points → 点名 -> 值
//! ```
//!
//! ## 设备描述格式
//!
//! ```yaml
//! devices:
//!   - name: boiler
//!     protocol: modbus
//!     serialPort: /dev/ttyUSB0
//!     baudRate: 9600
//!     deviceId: 1
//!     points:
//!       - { name: 温度, address: "100", dataType: INT }
//!   - name: press
//!     protocol: siemens-s7
//!     host: 192.168.0.10
//!     port: 102
//!     points:
//!       - { name: running, address: "M0.1", dataType: BOOL }
//!       - { name: speed, address: "DB1.DBD4", dataType: FLOAT }
//! ```

mod adapter;
mod error;
mod factory;
pub mod rtu;
pub mod s7;
mod types;

pub use adapter::{BoxedAdapter, DeviceStream, ProtocolAdapter};
pub use error::{ErrorKind, ProtocolError};
pub use factory::{AdapterFactory, DefaultAdapterFactory, s7_settings, serial_settings};
pub use rtu::RtuAdapter;
pub use s7::{MemoryArea, S7Adapter, S7Address};
pub use types::*;
