//! S7（TCP 块内存协议）
//!
//! - [`address`]：文本地址解析（`I1.0`、`Q0.7`、`M10.3`、`DB1.DBW0`、`DB2.DBD4` ...）
//! - [`frame`]：ISO-on-TCP（TPKT + COTP）与 S7 作业报文
//! - [`S7Adapter`]：连接握手与按地址读取

mod adapter;
pub mod address;
pub mod frame;

pub use adapter::S7Adapter;
pub use address::{MemoryArea, S7Address};
