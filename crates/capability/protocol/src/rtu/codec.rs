//! RTU 帧编解码与 CRC16 计算。

use crate::error::ProtocolError;

/// 读保持寄存器
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
/// 写单个寄存器
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
/// 异常响应标志位
pub const EXCEPTION_FLAG: u8 = 0x80;

/// 请求帧固定 8 字节
pub const REQUEST_FRAME_LEN: usize = 8;
/// 有效响应最短长度（异常响应：unit + fc + code + crc）
pub const MIN_RESPONSE_LEN: usize = 5;

pub const MIN_UNIT_ID: u32 = 1;
pub const MAX_UNIT_ID: u32 = 247;

/// Modbus 标准 CRC16（多项式 0xA001，初值 0xFFFF）。
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= *byte as u16;
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// 校验从站地址（1-247）。
pub fn validate_unit_id(unit_id: u32) -> Result<u8, ProtocolError> {
    if !(MIN_UNIT_ID..=MAX_UNIT_ID).contains(&unit_id) {
        return Err(ProtocolError::Validation(format!(
            "unit id must be between {} and {}, got {}",
            MIN_UNIT_ID, MAX_UNIT_ID, unit_id
        )));
    }
    Ok(unit_id as u8)
}

/// 校验寄存器写入值（0-65535）。
pub fn validate_register_value(value: i64) -> Result<u16, ProtocolError> {
    u16::try_from(value).map_err(|_| {
        ProtocolError::Validation(format!(
            "register value must be between 0 and 65535, got {}",
            value
        ))
    })
}

fn seal(pdu: [u8; 6]) -> [u8; REQUEST_FRAME_LEN] {
    let crc = crc16(&pdu).to_le_bytes();
    [pdu[0], pdu[1], pdu[2], pdu[3], pdu[4], pdu[5], crc[0], crc[1]]
}

/// 构建“读保持寄存器”请求帧（功能码 03）
pub fn build_read_request(unit_id: u8, start_address: u16, quantity: u16) -> [u8; REQUEST_FRAME_LEN] {
    let [addr_hi, addr_lo] = start_address.to_be_bytes();
    let [qty_hi, qty_lo] = quantity.to_be_bytes();
    seal([unit_id, FC_READ_HOLDING_REGISTERS, addr_hi, addr_lo, qty_hi, qty_lo])
}

/// 构建“写单个寄存器”请求帧（功能码 06）
pub fn build_write_request(unit_id: u8, address: u16, value: u16) -> [u8; REQUEST_FRAME_LEN] {
    let [addr_hi, addr_lo] = address.to_be_bytes();
    let [val_hi, val_lo] = value.to_be_bytes();
    seal([unit_id, FC_WRITE_SINGLE_REGISTER, addr_hi, addr_lo, val_hi, val_lo])
}

/// 校验参数后构建写请求帧；越界输入返回 `ProtocolError::Validation`。
pub fn encode_write_request(
    unit_id: u32,
    address: u16,
    value: i64,
) -> Result<[u8; REQUEST_FRAME_LEN], ProtocolError> {
    let unit_id = validate_unit_id(unit_id)?;
    let value = validate_register_value(value)?;
    Ok(build_write_request(unit_id, address, value))
}

/// 根据已收到的字节推断完整响应长度；信息不足时返回 `None`。
pub fn expected_response_len(function: u8, received: &[u8]) -> Option<usize> {
    let actual = *received.get(1)?;
    if actual & EXCEPTION_FLAG != 0 {
        return Some(MIN_RESPONSE_LEN);
    }
    if actual != function {
        return None;
    }
    match function {
        FC_READ_HOLDING_REGISTERS => received.get(2).map(|count| 3 + *count as usize + 2),
        FC_WRITE_SINGLE_REGISTER => Some(REQUEST_FRAME_LEN),
        _ => None,
    }
}

/// 校验响应头：长度、异常码、功能码。
pub fn check_response(function: u8, response: &[u8]) -> Result<(), ProtocolError> {
    if response.len() < MIN_RESPONSE_LEN {
        return Err(ProtocolError::InvalidResponse(format!(
            "response too short: {} bytes",
            response.len()
        )));
    }
    let actual = response[1];
    if actual == function {
        return Ok(());
    }
    if actual & EXCEPTION_FLAG != 0 {
        return Err(ProtocolError::Exception {
            function: actual & !EXCEPTION_FLAG,
            code: response[2],
        });
    }
    Err(ProtocolError::InvalidResponse(format!(
        "unexpected function code 0x{:02X}, expected 0x{:02X}",
        actual, function
    )))
}

/// 从“读 1 个寄存器”响应中取出寄存器值（字节 3-4，大端）。
pub fn parse_read_response(response: &[u8]) -> Result<u16, ProtocolError> {
    check_response(FC_READ_HOLDING_REGISTERS, response)?;
    Ok(u16::from_be_bytes([response[3], response[4]]))
}

/// 校验响应尾部 CRC（低字节在前）。
pub fn verify_checksum(frame: &[u8]) -> Result<(), ProtocolError> {
    if frame.len() < 3 {
        return Err(ProtocolError::InvalidResponse("frame too short for crc".to_string()));
    }
    let (payload, tail) = frame.split_at(frame.len() - 2);
    let expected = crc16(payload);
    let actual = u16::from_le_bytes([tail[0], tail[1]]);
    if expected != actual {
        return Err(ProtocolError::InvalidResponse(format!(
            "crc mismatch: expected 0x{:04X}, got 0x{:04X}",
            expected, actual
        )));
    }
    Ok(())
}
