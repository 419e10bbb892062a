//! Binary Wire Protocol
//!
//! Length-delimited request/response frames shared by the client, the
//! orchestrator and the workers.
//!
//! # Wire Format
//!
//! ```text
//! Request:  [Op:1][KeyLen:2 BE][ValLen:4 BE][Key:KeyLen][Value:ValLen]
//! Response: [Status:1][ValLen:4 BE][Value:ValLen]
//! ```
//!
//! Op: `0x01` GET, `0x02` SET. Status: `0x00` OK, `0x01` NOT_FOUND, `0x02` ERROR.
//!
//! There is no resynchronization marker: once a decode fails the remaining
//! bytes on the stream are meaningless and the connection must be dropped.

mod codec;
mod frame;

#[cfg(test)]
mod proptest;

use thiserror::Error;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, ClientCodec, ServerCodec,
};
pub use frame::{FrameLimits, Op, Request, Response, Status};

/// Size of the fixed request header (op + key length + value length)
pub const REQUEST_HEADER_LEN: usize = 1 + 2 + 4;

/// Size of the fixed response header (status + value length)
pub const RESPONSE_HEADER_LEN: usize = 1 + 4;

/// Default maximum key length in bytes
pub const DEFAULT_MAX_KEY_BYTES: u16 = 4096;

/// Default maximum value length in bytes (1 MiB)
pub const DEFAULT_MAX_VALUE_BYTES: u32 = 1 << 20;

/// Framing errors. Every variant is fatal for the connection it occurred on.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Operation byte is neither GET nor SET
    #[error("invalid operation byte 0x{0:02x}")]
    InvalidOp(u8),

    /// Status byte is not one of OK, NOT_FOUND, ERROR
    #[error("invalid status byte 0x{0:02x}")]
    InvalidStatus(u8),

    /// Key is longer than the configured (or wire) maximum
    #[error("key too large: {len} > {max}")]
    KeyTooLarge { len: usize, max: usize },

    /// Value is longer than the configured (or wire) maximum
    #[error("value too large: {len} > {max}")]
    ValueTooLarge { len: usize, max: usize },

    /// GET frames must not carry a value
    #[error("GET must have an empty value, got {0} bytes")]
    GetWithValue(usize),

    /// Stream ended before the declared lengths were satisfied
    #[error("truncated frame: expected {expected} bytes, {available} available")]
    Truncated { expected: usize, available: usize },

    /// Underlying transport failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
