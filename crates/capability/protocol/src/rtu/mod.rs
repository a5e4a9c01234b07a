//! Modbus RTU（串口寄存器协议）
//!
//! 只支持两个操作：读 1 个保持寄存器（0x03）与写单个寄存器（0x06）。
//!
//! ```text
//! [unit_id:1][function:1][address:2 BE][quantity|value:2 BE][crc:2 LE]
//! ```

mod adapter;
pub mod codec;

pub use adapter::RtuAdapter;
