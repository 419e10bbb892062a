//! Frame Encoding and Decoding
//!
//! The free functions operate on a `BytesMut` buffer and are shared by the
//! `tokio_util::codec` adapters below. Decoders validate the fixed header as
//! soon as it is buffered, so an oversized or malformed frame is rejected
//! before its body is read.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{
    FrameLimits, Op, ProtocolError, Request, Response, Status, REQUEST_HEADER_LEN,
    RESPONSE_HEADER_LEN,
};

const WIRE_MAX_KEY: usize = u16::MAX as usize;
const WIRE_MAX_VALUE: usize = u32::MAX as usize;

// =============================================================================
// Requests
// =============================================================================

/// Append an encoded request to `dst`
pub fn encode_request(req: &Request, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let key_len = req.key.len();
    if key_len > WIRE_MAX_KEY {
        return Err(ProtocolError::KeyTooLarge {
            len: key_len,
            max: WIRE_MAX_KEY,
        });
    }

    let value_len = req.value.len();
    if req.op == Op::Get && value_len != 0 {
        return Err(ProtocolError::GetWithValue(value_len));
    }
    if value_len > WIRE_MAX_VALUE {
        return Err(ProtocolError::ValueTooLarge {
            len: value_len,
            max: WIRE_MAX_VALUE,
        });
    }

    dst.reserve(req.encoded_len());
    dst.put_u8(req.op.as_byte());
    dst.put_u16(key_len as u16);
    dst.put_u32(value_len as u32);
    dst.extend_from_slice(&req.key);
    dst.extend_from_slice(&req.value);
    Ok(())
}

/// Decode one request from the front of `src`.
///
/// Returns `Ok(None)` while the frame is incomplete.
pub fn decode_request(
    src: &mut BytesMut,
    limits: &FrameLimits,
) -> Result<Option<Request>, ProtocolError> {
    let Some(&op_byte) = src.first() else {
        return Ok(None);
    };
    let op = Op::from_byte(op_byte)?;

    if src.len() < REQUEST_HEADER_LEN {
        return Ok(None);
    }

    let key_len = u16::from_be_bytes([src[1], src[2]]) as usize;
    if key_len > limits.max_key as usize {
        return Err(ProtocolError::KeyTooLarge {
            len: key_len,
            max: limits.max_key as usize,
        });
    }

    let value_len = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
    if value_len > limits.max_value as usize {
        return Err(ProtocolError::ValueTooLarge {
            len: value_len,
            max: limits.max_value as usize,
        });
    }
    if op == Op::Get && value_len != 0 {
        return Err(ProtocolError::GetWithValue(value_len));
    }

    if src.len() < REQUEST_HEADER_LEN + key_len + value_len {
        return Ok(None);
    }

    src.advance(REQUEST_HEADER_LEN);
    let key = src.split_to(key_len).freeze();
    let value = src.split_to(value_len).freeze();

    Ok(Some(Request { op, key, value }))
}

/// Total length of the request frame buffered at the front of `src`, as far
/// as its header tells.
fn pending_request_len(src: &[u8]) -> usize {
    if src.len() < REQUEST_HEADER_LEN {
        return REQUEST_HEADER_LEN;
    }
    let key_len = u16::from_be_bytes([src[1], src[2]]) as usize;
    let value_len = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
    REQUEST_HEADER_LEN + key_len + value_len
}

// =============================================================================
// Responses
// =============================================================================

/// Append an encoded response to `dst`
pub fn encode_response(res: &Response, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let value_len = res.value.len();
    if value_len > WIRE_MAX_VALUE {
        return Err(ProtocolError::ValueTooLarge {
            len: value_len,
            max: WIRE_MAX_VALUE,
        });
    }

    dst.reserve(res.encoded_len());
    dst.put_u8(res.status.as_byte());
    dst.put_u32(value_len as u32);
    dst.extend_from_slice(&res.value);
    Ok(())
}

/// Decode one response from the front of `src`.
///
/// Returns `Ok(None)` while the frame is incomplete.
pub fn decode_response(
    src: &mut BytesMut,
    max_value: u32,
) -> Result<Option<Response>, ProtocolError> {
    let Some(&status_byte) = src.first() else {
        return Ok(None);
    };
    let status = Status::from_byte(status_byte)?;

    if src.len() < RESPONSE_HEADER_LEN {
        return Ok(None);
    }

    let value_len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
    if value_len > max_value as usize {
        return Err(ProtocolError::ValueTooLarge {
            len: value_len,
            max: max_value as usize,
        });
    }

    if src.len() < RESPONSE_HEADER_LEN + value_len {
        return Ok(None);
    }

    src.advance(RESPONSE_HEADER_LEN);
    let value = src.split_to(value_len).freeze();

    Ok(Some(Response { status, value }))
}

fn pending_response_len(src: &[u8]) -> usize {
    if src.len() < RESPONSE_HEADER_LEN {
        return RESPONSE_HEADER_LEN;
    }
    let value_len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
    RESPONSE_HEADER_LEN + value_len
}

// =============================================================================
// Codec Adapters
// =============================================================================

/// Server side of a connection: reads requests, writes responses
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerCodec {
    limits: FrameLimits,
}

impl ServerCodec {
    pub fn new(limits: FrameLimits) -> Self {
        Self { limits }
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, ProtocolError> {
        decode_request(src, &self.limits)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Request>, ProtocolError> {
        match self.decode(src)? {
            Some(req) => Ok(Some(req)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated {
                expected: pending_request_len(src),
                available: src.len(),
            }),
        }
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, res: Response, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        encode_response(&res, dst)
    }
}

/// Client side of a connection: writes requests, reads responses
#[derive(Debug, Clone, Copy)]
pub struct ClientCodec {
    max_value: u32,
}

impl ClientCodec {
    pub fn new(max_value: u32) -> Self {
        Self { max_value }
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Response>, ProtocolError> {
        decode_response(src, self.max_value)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Response>, ProtocolError> {
        match self.decode(src)? {
            Some(res) => Ok(Some(res)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated {
                expected: pending_response_len(src),
                available: src.len(),
            }),
        }
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = ProtocolError;

    fn encode(&mut self, req: Request, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        encode_request(&req, dst)
    }
}

// =============================================================================
// Tests
// =============================================================================
