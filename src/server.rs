//! TCP server with connection handling
//!
//! Responsibilities:
//! - Accept TCP connections
//! - HTTP/1.1 parsing via hyper
//! - Spawn per-connection tasks
//! - Filter chain execution, then static page resolution for allowed requests
//! - Graceful shutdown support

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::content::{HTML_CONTENT_TYPE, Resolution, StaticResponder};
use crate::error::{GatekeeperError, Result};
use crate::filter::{FilterChain, Verdict};
use crate::request::{ClientIpConfig, GateRequest};

/// Body of every 404
pub const NOT_FOUND_BODY: &str = "Page not found";

/// Everything a request handler needs, shared across connections
pub struct Gatekeeper {
    filter_chain: FilterChain,
    responder: StaticResponder,
    client_ip: ClientIpConfig,
}

impl Gatekeeper {
    pub fn new(
        filter_chain: FilterChain,
        responder: StaticResponder,
        client_ip: ClientIpConfig,
    ) -> Self {
        Self {
            filter_chain,
            responder,
            client_ip,
        }
    }

    /// Classify a request and produce the response for it
    pub async fn handle(&self, req: &GateRequest) -> Response<Full<Bytes>> {
        match self.filter_chain.execute(req).await {
            Verdict::Deny(reason) => {
                text_response(StatusCode::FORBIDDEN, reason.message(), "text/plain")
            }
            Verdict::Allow => match self.responder.resolve(&req.path).await {
                Resolution::Found { page, body } => {
                    info!(page = %page, source = ?req.source_addr, "Serving page");
                    text_response(StatusCode::OK, body, HTML_CONTENT_TYPE)
                }
                Resolution::NotFound => {
                    text_response(StatusCode::NOT_FOUND, NOT_FOUND_BODY, "text/plain")
                }
            },
        }
    }
}

fn text_response(
    status: StatusCode,
    body: impl Into<Bytes>,
    content_type: &'static str,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Main server struct
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    gatekeeper: Arc<Gatekeeper>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, gatekeeper: Gatekeeper) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatekeeperError::Bind { addr, source: e })?;

        let actual_addr = listener.local_addr().map_err(|e| {
            GatekeeperError::Config(format!("Failed to get local address: {}", e))
        })?;

        info!(%actual_addr, "Server bound successfully");

        Ok(Self {
            listener,
            addr: actual_addr,
            gatekeeper: Arc::new(gatekeeper),
        })
    }

    /// Serve until the process is killed
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves; in-flight connections finish on their own tasks
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(addr = %self.addr, "Starting server");
        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
                conn = self.listener.accept() => match conn {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(%e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let io = TokioIo::new(stream);
            let gatekeeper = self.gatekeeper.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    handle_request(req, remote_addr, gatekeeper.clone())
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(%remote_addr, %e, "Connection error");
                }
            });
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Handle a single HTTP request
///
/// Flow:
/// 1. Lift headers into a GateRequest
/// 2. Execute filter chain
/// 3. If Allow: resolve the static page; if Deny: 403 with the cause
async fn handle_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
    gatekeeper: Arc<Gatekeeper>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method();
    let uri = req.uri();

    info!(%remote_addr, %method, %uri, "Request received");

    let gate_request = GateRequest::from_parts(
        req.headers(),
        uri.path(),
        remote_addr,
        &gatekeeper.client_ip,
    );

    Ok(gatekeeper.handle(&gate_request).await)
}
