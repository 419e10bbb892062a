//! Frame types

use bytes::Bytes;

use super::{ProtocolError, DEFAULT_MAX_KEY_BYTES, DEFAULT_MAX_VALUE_BYTES};

/// Request operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Get = 0x01,
    Set = 0x02,
}

impl Op {
    /// Wire representation
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Lowercase label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Get => "get",
            Op::Set => "set",
        }
    }

    /// Parse the wire representation
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x01 => Ok(Op::Get),
            0x02 => Ok(Op::Set),
            other => Err(ProtocolError::InvalidOp(other)),
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Get => write!(f, "GET"),
            Op::Set => write!(f, "SET"),
        }
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

impl Status {
    /// Wire representation
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Lowercase label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::NotFound => "not_found",
            Status::Error => "error",
        }
    }

    /// Parse the wire representation
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x00 => Ok(Status::Ok),
            0x01 => Ok(Status::NotFound),
            0x02 => Ok(Status::Error),
            other => Err(ProtocolError::InvalidStatus(other)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::NotFound => write!(f, "NOT_FOUND"),
            Status::Error => write!(f, "ERROR"),
        }
    }
}

/// A single client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub op: Op,
    pub key: Bytes,
    /// Always empty for GET
    pub value: Bytes,
}

impl Request {
    /// Build a GET request
    pub fn get(key: impl Into<Bytes>) -> Self {
        Self {
            op: Op::Get,
            key: key.into(),
            value: Bytes::new(),
        }
    }

    /// Build a SET request
    pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            op: Op::Set,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encoded size of this request on the wire
    pub fn encoded_len(&self) -> usize {
        super::REQUEST_HEADER_LEN + self.key.len() + self.value.len()
    }
}

/// A single response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    /// Only meaningful for OK responses to GET
    pub value: Bytes,
}

impl Response {
    /// OK carrying a value
    pub fn ok(value: impl Into<Bytes>) -> Self {
        Self {
            status: Status::Ok,
            value: value.into(),
        }
    }

    /// OK without a value (SET acknowledgement)
    pub fn ok_empty() -> Self {
        Self::ok(Bytes::new())
    }

    /// Key not present
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            value: Bytes::new(),
        }
    }

    /// Generic failure
    pub fn error() -> Self {
        Self {
            status: Status::Error,
            value: Bytes::new(),
        }
    }

    /// Check if status is OK
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Encoded size of this response on the wire
    pub fn encoded_len(&self) -> usize {
        super::RESPONSE_HEADER_LEN + self.value.len()
    }
}

/// Decoder-side bounds on declared frame lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Maximum key length in bytes
    pub max_key: u16,
    /// Maximum value length in bytes
    pub max_value: u32,
}

impl FrameLimits {
    /// Create limits with explicit bounds
    pub fn new(max_key: u16, max_value: u32) -> Self {
        Self { max_key, max_value }
    }

    /// The widest limits the wire format can express
    pub fn unbounded() -> Self {
        Self {
            max_key: u16::MAX,
            max_value: u32::MAX,
        }
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_key: DEFAULT_MAX_KEY_BYTES,
            max_value: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}
