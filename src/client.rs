//! Protocol Client
//!
//! A single framed TCP connection to an orchestrator or a worker. Requests on
//! one client are strictly sequential: each `call` writes a frame, flushes,
//! and waits for exactly one response frame.

use std::io;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::proto::{ClientCodec, ProtocolError, Request, Response};

/// Client connection speaking the cache wire protocol
pub struct CacheClient {
    framed: Framed<TcpStream, ClientCodec>,
}

impl CacheClient {
    /// Connect to `addr`; responses larger than `max_value` are rejected
    pub async fn connect(addr: impl ToSocketAddrs, max_value: u32) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream, max_value))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, max_value: u32) -> Self {
        Self {
            framed: Framed::new(stream, ClientCodec::new(max_value)),
        }
    }

    /// Send one request and wait for its response
    pub async fn call(&mut self, req: Request) -> Result<Response, ProtocolError> {
        self.framed.send(req).await?;

        match self.framed.next().await {
            Some(result) => result,
            None => Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response",
            ))),
        }
    }

    /// GET a key
    pub async fn get(&mut self, key: impl Into<Bytes>) -> Result<Response, ProtocolError> {
        self.call(Request::get(key)).await
    }

    /// SET a key
    pub async fn set(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Result<Response, ProtocolError> {
        self.call(Request::set(key, value)).await
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("peer", &self.framed.get_ref().peer_addr().ok())
            .finish()
    }
}
