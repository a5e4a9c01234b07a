//! ISO-on-TCP 与 S7 报文。
//!
//! ```text
//! TPKT(4) | COTP(LI + ...) | S7 header(10/12) | parameter | data
//! ```

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};

pub const TPKT_VERSION: u8 = 0x03;
pub const TPKT_HEADER_LEN: usize = 4;

const COTP_CR: u8 = 0xE0;
const COTP_CC: u8 = 0xD0;
const COTP_DT: u8 = 0xF0;

const S7_PROTOCOL_ID: u8 = 0x32;
const S7_JOB: u8 = 0x01;
const S7_ACK_DATA: u8 = 0x03;
const S7_ACK_DATA_HEADER_LEN: usize = 12;

const FN_READ_VAR: u8 = 0x04;
const FN_SETUP_COMMUNICATION: u8 = 0xF0;

/// 读变量时请求的传输尺寸：BYTE
const TS_BYTE: u8 = 0x02;
/// 数据项返回码：成功
const RETURN_CODE_SUCCESS: u8 = 0xFF;

/// 本地 TSAP（PG 通信）
pub const LOCAL_TSAP: u16 = 0x0100;
/// 建议 PDU 长度
pub const PREFERRED_PDU_LEN: u16 = 480;

/// 远端 TSAP：高字节 0x01，低字节 rack*32 + slot
pub fn remote_tsap(rack: u8, slot: u8) -> u16 {
    0x0100 | (((rack as u16) * 32 + slot as u16) & 0xFF)
}

fn put_tpkt(buf: &mut BytesMut, total_len: usize) {
    buf.put_u8(TPKT_VERSION);
    buf.put_u8(0x00);
    buf.put_u16(total_len as u16);
}

fn put_cotp_data(buf: &mut BytesMut) {
    buf.put_u8(0x02);
    buf.put_u8(COTP_DT);
    buf.put_u8(0x80);
}

fn put_job_header(buf: &mut BytesMut, pdu_ref: u16, param_len: u16, data_len: u16) {
    buf.put_u8(S7_PROTOCOL_ID);
    buf.put_u8(S7_JOB);
    buf.put_u16(0x0000);
    buf.put_u16(pdu_ref);
    buf.put_u16(param_len);
    buf.put_u16(data_len);
}

/// COTP 连接请求（CR），TPDU 1024 字节
pub fn build_connect_request(rack: u8, slot: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(22);
    put_tpkt(&mut buf, 22);
    buf.put_u8(17);
    buf.put_u8(COTP_CR);
    buf.put_u16(0x0000);
    buf.put_u16(0x0001);
    buf.put_u8(0x00);
    buf.put_slice(&[0xC0, 0x01, 0x0A]);
    buf.put_slice(&[0xC1, 0x02]);
    buf.put_u16(LOCAL_TSAP);
    buf.put_slice(&[0xC2, 0x02]);
    buf.put_u16(remote_tsap(rack, slot));
    buf.freeze()
}

/// S7 Setup Communication 作业
pub fn build_setup_communication(pdu_ref: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(25);
    put_tpkt(&mut buf, 25);
    put_cotp_data(&mut buf);
    put_job_header(&mut buf, pdu_ref, 8, 0);
    buf.put_u8(FN_SETUP_COMMUNICATION);
    buf.put_u8(0x00);
    buf.put_u16(1);
    buf.put_u16(1);
    buf.put_u16(PREFERRED_PDU_LEN);
    buf.freeze()
}

/// 单项 Read Var 作业：从 `area/db/start` 读取 `count` 字节
pub fn build_read_var(pdu_ref: u16, area: u8, db_number: u16, start: u32, count: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(31);
    put_tpkt(&mut buf, 31);
    put_cotp_data(&mut buf);
    put_job_header(&mut buf, pdu_ref, 14, 0);
    buf.put_u8(FN_READ_VAR);
    buf.put_u8(1);
    // S7ANY 变量规格
    buf.put_slice(&[0x12, 0x0A, 0x10]);
    buf.put_u8(TS_BYTE);
    buf.put_u16(count);
    buf.put_u16(db_number);
    buf.put_u8(area);
    let bit_address = start.saturating_mul(8) & 0x00FF_FFFF;
    buf.put_slice(&bit_address.to_be_bytes()[1..]);
    buf.freeze()
}

/// 从 TPKT 头读取整帧长度
pub fn tpkt_frame_len(header: &[u8; TPKT_HEADER_LEN]) -> Result<usize, ProtocolError> {
    if header[0] != TPKT_VERSION {
        return Err(ProtocolError::InvalidResponse(format!(
            "unexpected tpkt version 0x{:02X}",
            header[0]
        )));
    }
    let len = u16::from_be_bytes([header[2], header[3]]) as usize;
    if len < TPKT_HEADER_LEN + 2 {
        return Err(ProtocolError::InvalidResponse(format!("tpkt length too small: {}", len)));
    }
    Ok(len)
}

fn cotp(frame: &[u8]) -> Result<(u8, &[u8]), ProtocolError> {
    let li = *frame
        .get(TPKT_HEADER_LEN)
        .ok_or_else(|| ProtocolError::InvalidResponse("missing cotp header".to_string()))?
        as usize;
    let end = TPKT_HEADER_LEN + 1 + li;
    if li < 1 || frame.len() < end {
        return Err(ProtocolError::InvalidResponse("invalid cotp length".to_string()));
    }
    Ok((frame[TPKT_HEADER_LEN + 1], &frame[end..]))
}

/// 校验 COTP 连接确认（CC）
pub fn check_connect_confirm(frame: &[u8]) -> Result<(), ProtocolError> {
    let (pdu_type, _) = cotp(frame)?;
    if pdu_type != COTP_CC {
        return Err(ProtocolError::InvalidResponse(format!(
            "expected cotp connect confirm, got 0x{:02X}",
            pdu_type
        )));
    }
    Ok(())
}

/// 读取 S7 报文头中的 pdu_ref；不是 S7 报文时返回 None
pub fn peek_pdu_ref(frame: &[u8]) -> Option<u16> {
    let (_, s7) = cotp(frame).ok()?;
    if s7.len() < S7_ACK_DATA_HEADER_LEN || s7[0] != S7_PROTOCOL_ID {
        return None;
    }
    Some(u16::from_be_bytes([s7[4], s7[5]]))
}

/// Ack-Data 报文的参数区与数据区
#[derive(Debug)]
pub struct AckData<'a> {
    pub pdu_ref: u16,
    pub param: &'a [u8],
    pub data: &'a [u8],
}

/// 解析 S7 Ack-Data；错误类/错误码非零时返回 `InvalidResponse`
pub fn parse_ack_data(frame: &[u8]) -> Result<AckData<'_>, ProtocolError> {
    let (pdu_type, s7) = cotp(frame)?;
    if pdu_type != COTP_DT {
        return Err(ProtocolError::InvalidResponse(format!(
            "expected cotp data, got 0x{:02X}",
            pdu_type
        )));
    }
    if s7.len() < S7_ACK_DATA_HEADER_LEN || s7[0] != S7_PROTOCOL_ID {
        return Err(ProtocolError::InvalidResponse("invalid s7 header".to_string()));
    }
    if s7[1] != S7_ACK_DATA {
        return Err(ProtocolError::InvalidResponse(format!(
            "unexpected s7 pdu type 0x{:02X}",
            s7[1]
        )));
    }
    let (error_class, error_code) = (s7[10], s7[11]);
    if error_class != 0 || error_code != 0 {
        return Err(ProtocolError::InvalidResponse(format!(
            "s7 error class 0x{:02X}, code 0x{:02X}",
            error_class, error_code
        )));
    }

    let pdu_ref = u16::from_be_bytes([s7[4], s7[5]]);
    let param_len = u16::from_be_bytes([s7[6], s7[7]]) as usize;
    let data_len = u16::from_be_bytes([s7[8], s7[9]]) as usize;
    let body = &s7[S7_ACK_DATA_HEADER_LEN..];
    if body.len() < param_len + data_len {
        return Err(ProtocolError::InvalidResponse("truncated s7 payload".to_string()));
    }
    Ok(AckData {
        pdu_ref,
        param: &body[..param_len],
        data: &body[param_len..param_len + data_len],
    })
}

/// 解析 Setup Communication 响应，返回协商后的 PDU 长度
pub fn parse_setup_communication(frame: &[u8]) -> Result<u16, ProtocolError> {
    let ack = parse_ack_data(frame)?;
    if ack.param.len() < 8 || ack.param[0] != FN_SETUP_COMMUNICATION {
        return Err(ProtocolError::InvalidResponse("invalid setup communication ack".to_string()));
    }
    Ok(u16::from_be_bytes([ack.param[6], ack.param[7]]))
}

/// 解析单项 Read Var 响应，返回数据字节
pub fn parse_read_var(frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let ack = parse_ack_data(frame)?;
    if ack.param.len() < 2 || ack.param[0] != FN_READ_VAR {
        return Err(ProtocolError::InvalidResponse("invalid read var ack".to_string()));
    }
    let item = ack.data;
    if item.is_empty() {
        return Err(ProtocolError::InvalidResponse("empty read var item".to_string()));
    }
    if item[0] != RETURN_CODE_SUCCESS {
        return Err(ProtocolError::InvalidResponse(format!(
            "read var item failed with return code 0x{:02X}",
            item[0]
        )));
    }
    if item.len() < 4 {
        return Err(ProtocolError::InvalidResponse("truncated read var item".to_string()));
    }
    let transport_size = item[1];
    let raw_len = u16::from_be_bytes([item[2], item[3]]) as usize;
    // BIT/BYTE/WORD/DWORD/INT 的长度以位计，其余以字节计
    let byte_len = match transport_size {
        0x03..=0x05 => raw_len.div_ceil(8),
        _ => raw_len,
    };
    let payload = &item[4..];
    if payload.len() < byte_len {
        return Err(ProtocolError::InvalidResponse(format!(
            "read var item declares {} bytes, got {}",
            byte_len,
            payload.len()
        )));
    }
    Ok(payload[..byte_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 组装一帧 Ack-Data（测试用）
    fn ack_frame(param: &[u8], data: &[u8]) -> Vec<u8> {
        let total = TPKT_HEADER_LEN + 3 + S7_ACK_DATA_HEADER_LEN + param.len() + data.len();
        let mut buf = vec![TPKT_VERSION, 0x00];
        buf.extend_from_slice(&(total as u16).to_be_bytes());
        buf.extend_from_slice(&[0x02, COTP_DT, 0x80]);
        buf.extend_from_slice(&[S7_PROTOCOL_ID, S7_ACK_DATA, 0x00, 0x00, 0x00, 0x07]);
        buf.extend_from_slice(&(param.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
        buf.extend_from_slice(&[0x00, 0x00]);
        buf.extend_from_slice(param);
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn test_connect_request_layout() {
        let frame = build_connect_request(0, 2);
        assert_eq!(frame.len(), 22);
        assert_eq!(&frame[..4], &[0x03, 0x00, 0x00, 0x16]);
        assert_eq!(frame[4] as usize, frame.len() - 5);
        assert_eq!(frame[5], COTP_CR);
        assert_eq!(&frame[18..], &[0xC2, 0x02, 0x01, 0x02]);
        assert_eq!(remote_tsap(0, 1), 0x0101);
        assert_eq!(remote_tsap(1, 3), 0x0123);
    }

    #[test]
    fn test_read_var_layout() {
        let frame = build_read_var(7, 0x84, 1, 4, 2);
        assert_eq!(frame.len(), 31);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), 31);
        // S7 header: pdu_ref / param_len
        assert_eq!(&frame[11..13], &[0x00, 0x07]);
        assert_eq!(&frame[13..15], &[0x00, 0x0E]);
        // item: transport BYTE, count 2, DB1, area DB, bit address 32
        assert_eq!(&frame[17..], &[0x04, 0x01, 0x12, 0x0A, 0x10, 0x02, 0x00, 0x02, 0x00, 0x01, 0x84, 0x00, 0x00, 0x20]);
    }

    #[test]
    fn test_setup_communication_layout() {
        let frame = build_setup_communication(1);
        assert_eq!(frame.len(), 25);
        assert_eq!(&frame[17..], &[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x01, 0xE0]);
    }

    #[test]
    fn test_parse_setup_communication() {
        let frame = ack_frame(&[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0xF0], &[]);
        assert_eq!(parse_setup_communication(&frame).unwrap(), 240);
    }

    #[test]
    fn test_parse_read_var() {
        let frame = ack_frame(&[0x04, 0x01], &[0xFF, 0x04, 0x00, 0x10, 0x34, 0x12]);
        assert_eq!(parse_read_var(&frame).unwrap(), vec![0x34, 0x12]);

        let frame = ack_frame(&[0x04, 0x01], &[0x0A, 0x00, 0x00, 0x00]);
        assert!(matches!(parse_read_var(&frame).unwrap_err(), ProtocolError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_ack_error_class() {
        let mut frame = ack_frame(&[0x04, 0x01], &[]);
        frame[TPKT_HEADER_LEN + 3 + 10] = 0x85;
        assert!(parse_ack_data(&frame).is_err());
    }

    #[test]
    fn test_peek_pdu_ref() {
        let frame = ack_frame(&[0x04, 0x01], &[]);
        assert_eq!(peek_pdu_ref(&frame), Some(7));
        assert_eq!(parse_ack_data(&frame).unwrap().pdu_ref, 7);
        // 连接确认不带 S7 头
        assert_eq!(peek_pdu_ref(&[0x03, 0x00, 0x00, 0x07, 0x02, COTP_CC, 0x00]), None);
    }

    #[test]
    fn test_tpkt_frame_len() {
        assert_eq!(tpkt_frame_len(&[0x03, 0x00, 0x00, 0x16]).unwrap(), 22);
        assert!(tpkt_frame_len(&[0x04, 0x00, 0x00, 0x16]).is_err());
        assert!(tpkt_frame_len(&[0x03, 0x00, 0x00, 0x02]).is_err());
    }
}
