//! Connection Service Loop
//!
//! Accept loop and per-connection frame loop shared by the worker and the
//! orchestrator. Each accepted socket gets its own task:
//!
//! ```text
//!            ┌──────────────┐  frame   ┌──────────┐  response  ┌─────────┐
//!  accept ──▶│ AWAIT_FRAME  │─────────▶│ PROCESS  │───────────▶│ RESPOND │
//!            └──────────────┘          └──────────┘            └────┬────┘
//!              │  ▲ idle timeout /                                  │
//!              │  │ decode error / EOF                              │
//!              │  └─────────────────────────────────────────────────┘
//!              ▼
//!           CLOSED
//! ```
//!
//! A frame the codec rejects closes the connection without a response, since
//! the byte stream can no longer be trusted.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::{metrics, Role};
use crate::proto::{FrameLimits, ProtocolError, Request, Response, ServerCodec};

/// Turns one decoded request into one response.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, req: Request) -> Response;
}

/// Per-connection settings
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub role: Role,
    /// Maximum wait for the next frame
    pub idle_timeout: Duration,
    pub limits: FrameLimits,
}

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Connections already accepted keep running until they close or go idle.
pub async fn serve<H, F>(
    listener: TcpListener,
    handler: Arc<H>,
    settings: ConnectionSettings,
    shutdown: F,
) -> Result<()>
where
    H: RequestHandler,
    F: Future<Output = ()>,
{
    let local_addr = listener.local_addr()?;
    info!(role = %settings.role, addr = %local_addr, "Listening");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(role = %settings.role, addr = %local_addr, "Shutting down listener");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        metrics().record_connection(settings.role);
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, peer, handler, settings).await;
                        });
                    }
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning
                        warn!(role = %settings.role, "Accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        }
    }
}

async fn handle_connection<H: RequestHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
    settings: ConnectionSettings,
) {
    let role = settings.role;
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, "Failed to set TCP_NODELAY: {}", e);
    }
    debug!(%role, %peer, "Connection opened");

    let mut framed = Framed::new(stream, ServerCodec::new(settings.limits));

    loop {
        let req = match timeout(settings.idle_timeout, framed.next()).await {
            Err(_) => {
                debug!(%role, %peer, "Idle timeout, closing connection");
                break;
            }
            Ok(None) => {
                debug!(%role, %peer, "Connection closed by peer");
                break;
            }
            Ok(Some(Err(ProtocolError::Io(e)))) => {
                debug!(%role, %peer, "Read error: {}", e);
                break;
            }
            Ok(Some(Err(e))) => {
                metrics().record_protocol_error(role);
                warn!(%role, %peer, "Dropping connection: {}", e);
                break;
            }
            Ok(Some(Ok(req))) => req,
        };

        metrics().record_request(role, req.op);
        let response = handler.handle(req).await;
        metrics().record_response(role, response.status);

        if let Err(e) = framed.send(response).await {
            debug!(%role, %peer, "Write error: {}", e);
            break;
        }
    }
}
