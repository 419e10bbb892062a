//! Metrics / Health HTTP Endpoint

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::{metrics, Role};
use crate::error::{Error, Result};

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub role: Role,
    pub version: &'static str,
}

impl HealthResponse {
    fn healthy(role: Role) -> Self {
        Self {
            status: "ok",
            role,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

fn route(path: &str, role: Role) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => match metrics().encode() {
            Ok((content_type, body)) => respond(StatusCode::OK, &content_type, body),
            Err(e) => respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                e.to_string(),
            ),
        },
        "/healthz" | "/livez" | "/readyz" => {
            match serde_json::to_vec(&HealthResponse::healthy(role)) {
                Ok(body) => respond(StatusCode::OK, "application/json", body),
                Err(e) => respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    e.to_string(),
                ),
            }
        }
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
    }
}

/// Serve `/metrics` and `/healthz` on `addr` until the task is dropped
pub async fn serve(addr: SocketAddr, role: Role) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?;

        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| async move {
                Ok::<_, std::convert::Infallible>(route(req.uri().path(), role))
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}
