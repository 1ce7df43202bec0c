//! Control server
//!
//! Listens on 127.0.0.1 only. Every connection must authenticate with the
//! installation's control token before any other request, `Status` included,
//! is answered.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use mg_core::control_auth;
use mg_protocol::{ControlCodec, ControlErrorKind, ControlFrame, ControlRequest, ControlResponse};

use crate::adapter::{self, TunnelAdapter};

pub struct ControlServer {
    listener: TcpListener,
    adapter: Arc<TunnelAdapter>,
    token: Arc<str>,
    shutdown: CancellationToken,
}

impl ControlServer {
    /// Bind the control socket. `address` must be a loopback address.
    pub async fn bind(address: &str, adapter: Arc<TunnelAdapter>, token: String) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind control socket to {}", address))?;

        let local = listener.local_addr()?;
        if !local.ip().is_loopback() {
            anyhow::bail!("Control socket must bind a loopback address, got {}", local);
        }

        Ok(Self {
            listener,
            adapter,
            token: token.into(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("Control socket listening on {}", self.listener.local_addr()?);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Control socket shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if !peer.ip().is_loopback() {
                            tracing::warn!("Rejected non-localhost control connection from {}", peer);
                            continue;
                        }

                        let adapter = Arc::clone(&self.adapter);
                        let token = Arc::clone(&self.token);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, adapter, token).await {
                                tracing::warn!("Control connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => tracing::error!("Failed to accept control connection: {}", e),
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, adapter: Arc<TunnelAdapter>, token: Arc<str>) -> Result<()> {
    let mut framed = Framed::new(stream, ControlCodec::new());
    let mut authenticated = false;

    while let Some(frame) = framed.next().await {
        let request = match frame? {
            ControlFrame::Request(request) => request,
            ControlFrame::Response(_) => {
                tracing::debug!("Ignoring response frame from control client");
                continue;
            }
        };

        let response = match request {
            ControlRequest::Authenticate { token: provided } => {
                if control_auth::validate_token(&provided, &token) {
                    authenticated = true;
                    ControlResponse::Authenticated
                } else {
                    tracing::warn!("Control client presented a bad token");
                    ControlResponse::error(ControlErrorKind::Unauthorized, "invalid token")
                }
            }
            _ if !authenticated => {
                ControlResponse::error(ControlErrorKind::Unauthorized, "authenticate first")
            }
            request => dispatch(request, &adapter).await,
        };

        framed.send(ControlFrame::Response(response)).await?;
    }

    tracing::debug!("Control client disconnected");
    Ok(())
}

async fn dispatch(request: ControlRequest, adapter: &TunnelAdapter) -> ControlResponse {
    match request {
        ControlRequest::Start => match adapter.start().await {
            Ok(()) => ControlResponse::Started,
            Err(e) => ControlResponse::error(adapter::error_kind(&e), e.message()),
        },
        ControlRequest::Stop => {
            adapter.stop().await;
            ControlResponse::Stopped
        }
        ControlRequest::Status => ControlResponse::Status(adapter.status().await),
        ControlRequest::Authenticate { .. } => ControlResponse::Authenticated,
    }
}
