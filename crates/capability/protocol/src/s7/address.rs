//! S7 地址解析。
//!
//! 两种语法：
//! - 位地址 `<区域><字节偏移>.<位偏移>`，区域为 I / Q / M
//! - 数据块地址 `DB<n>.[DB]<B|W|D><字节偏移>`，分别读取 1 / 2 / 4 字节

use crate::error::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 最大字节偏移：请求中的位地址只有 3 字节（字节偏移 * 8 + 位偏移）
pub const MAX_BYTE_OFFSET: u32 = 0x1F_FFFF;

/// S7 存储区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryArea {
    /// 过程输入（I）
    Inputs,
    /// 过程输出（Q）
    Outputs,
    /// 标志位（M）
    Flags,
    /// 数据块（DB）
    DataBlock,
}

impl MemoryArea {
    /// S7 报文中的区域码
    pub fn code(self) -> u8 {
        match self {
            Self::Inputs => 0x81,
            Self::Outputs => 0x82,
            Self::Flags => 0x83,
            Self::DataBlock => 0x84,
        }
    }
}

impl fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inputs => "I",
            Self::Outputs => "Q",
            Self::Flags => "M",
            Self::DataBlock => "DB",
        };
        f.write_str(name)
    }
}

/// 解析后的 S7 地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct S7Address {
    pub area: MemoryArea,
    /// DB 编号；非 DB 区域为 0
    pub db_number: u16,
    pub byte_offset: u32,
    /// 位偏移，仅布尔点位有效
    pub bit_offset: u8,
    /// 读取字节数：1 / 2 / 4
    pub size: u8,
    pub is_bool: bool,
}

impl S7Address {
    /// 解析文本地址；大小写与首尾空白不敏感。
    pub fn parse(address: &str) -> Result<Self, ProtocolError> {
        let addr = address.trim().to_ascii_uppercase();
        if addr.is_empty() {
            return Err(ProtocolError::address(address, "address is empty"));
        }

        if let Some(bit) = parse_bit_address(address, &addr)? {
            return Ok(bit);
        }

        if let Some(rest) = addr.strip_prefix("DB") {
            return parse_db_address(address, rest);
        }

        Err(ProtocolError::address(address, "unsupported address format"))
    }
}

impl FromStr for S7Address {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// I1.0 / Q1.0 / M1.0；不匹配位地址形态时返回 `None`
fn parse_bit_address(raw: &str, addr: &str) -> Result<Option<S7Address>, ProtocolError> {
    let area = match addr.as_bytes()[0] {
        b'I' => MemoryArea::Inputs,
        b'Q' => MemoryArea::Outputs,
        b'M' => MemoryArea::Flags,
        _ => return Ok(None),
    };
    let Some((byte_part, bit_part)) = addr[1..].split_once('.') else {
        return Err(ProtocolError::address(raw, "bit address requires <byte>.<bit>"));
    };

    let byte_offset = parse_byte_offset(raw, byte_part)?;
    let bit_offset = parse_number::<u8>(raw, bit_part, "bit offset")?;
    if bit_offset > 7 {
        return Err(ProtocolError::address(raw, "bit offset must be between 0 and 7"));
    }

    Ok(Some(S7Address {
        area,
        db_number: 0,
        byte_offset,
        bit_offset,
        size: 1,
        is_bool: true,
    }))
}

/// DB1.DBW0 / DB1.DBD4 / DB1.B2（`rest` 已去掉前缀 "DB"）
fn parse_db_address(raw: &str, rest: &str) -> Result<S7Address, ProtocolError> {
    let mut parts = rest.split('.');
    let db_part = parts.next().unwrap_or_default();
    let Some(data_part) = parts.next() else {
        return Err(ProtocolError::address(raw, "data block address requires DB<n>.<tag><offset>"));
    };
    if parts.next().is_some() {
        return Err(ProtocolError::address(raw, "too many address segments"));
    }

    let db_number = parse_number::<u16>(raw, db_part, "data block number")?;

    let data_part = data_part.strip_prefix("DB").unwrap_or(data_part);
    let size = match data_part.as_bytes().first() {
        Some(b'B') => 1,
        Some(b'W') => 2,
        Some(b'D') => 4,
        _ => {
            return Err(ProtocolError::address(raw, format!("unsupported data tag: {}", data_part)));
        }
    };
    let byte_offset = parse_byte_offset(raw, &data_part[1..])?;

    Ok(S7Address {
        area: MemoryArea::DataBlock,
        db_number,
        byte_offset,
        bit_offset: 0,
        size,
        is_bool: false,
    })
}

fn parse_byte_offset(raw: &str, text: &str) -> Result<u32, ProtocolError> {
    let offset = parse_number::<u32>(raw, text, "byte offset")?;
    if offset > MAX_BYTE_OFFSET {
        return Err(ProtocolError::address(
            raw,
            format!("byte offset {} exceeds {}", offset, MAX_BYTE_OFFSET),
        ));
    }
    Ok(offset)
}

fn parse_number<T: FromStr>(raw: &str, text: &str, what: &str) -> Result<T, ProtocolError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::address(raw, format!("invalid {}: '{}'", what, text)));
    }
    text.parse::<T>()
        .map_err(|_| ProtocolError::address(raw, format!("{} out of range: {}", what, text)))
}
