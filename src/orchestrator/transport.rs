//! Worker Transport
//!
//! How the orchestrator reaches a worker. The TCP implementation opens a fresh
//! connection per call: dial, write one request, read one response, close.

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

use crate::client::CacheClient;
use crate::proto::{ProtocolError, Request, Response, Status};

/// Why a single worker call did not produce a usable response
#[derive(Error, Debug)]
pub enum WorkerCallError {
    /// Dial failed
    #[error("connect failed: {0}")]
    Connect(io::Error),

    /// Write or read failed mid-exchange
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// The worker answered with an undecodable frame
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// The request deadline elapsed first
    #[error("deadline exceeded")]
    Timeout,

    /// The worker closed the connection without answering
    #[error("connection closed before response")]
    Closed,

    /// The worker answered with a failure status
    #[error("worker returned {0}")]
    Remote(Status),
}

impl WorkerCallError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            WorkerCallError::Connect(_) => "connect",
            WorkerCallError::Io(_) => "io",
            WorkerCallError::Protocol(_) => "protocol",
            WorkerCallError::Timeout => "timeout",
            WorkerCallError::Closed => "closed",
            WorkerCallError::Remote(_) => "remote",
        }
    }
}

impl From<ProtocolError> for WorkerCallError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                WorkerCallError::Closed
            }
            ProtocolError::Io(e) => WorkerCallError::Io(e),
            other => WorkerCallError::Protocol(other),
        }
    }
}

/// Sends one request to one worker.
///
/// Deadlines are enforced by the caller; implementations only need to be
/// cancel-safe, i.e. dropping the future abandons the call.
#[async_trait]
pub trait WorkerTransport: Send + Sync + 'static {
    async fn call(&self, addr: &str, req: Request) -> Result<Response, WorkerCallError>;
}

/// One short-lived TCP connection per call
#[derive(Debug, Clone)]
pub struct TcpWorkerTransport {
    max_value: u32,
}

impl TcpWorkerTransport {
    /// Responses with values larger than `max_value` are rejected
    pub fn new(max_value: u32) -> Self {
        Self { max_value }
    }
}

#[async_trait]
impl WorkerTransport for TcpWorkerTransport {
    #[instrument(level = "debug", skip(self, req), fields(op = %req.op))]
    async fn call(&self, addr: &str, req: Request) -> Result<Response, WorkerCallError> {
        let mut client = CacheClient::connect(addr, self.max_value)
            .await
            .map_err(WorkerCallError::Connect)?;
        let response = client.call(req).await?;
        Ok(response)
    }
}
