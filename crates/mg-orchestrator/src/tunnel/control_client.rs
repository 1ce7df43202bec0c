//! Client side of the tunnel runner's control channel

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use mg_core::error::TunnelError;
use mg_protocol::{ControlCodec, ControlErrorKind, ControlFrame, ControlRequest, ControlResponse, RunnerStatus};

/// An authenticated connection to a tunnel runner
pub struct ControlClient {
    framed: Framed<TcpStream, ControlCodec>,
}

impl ControlClient {
    /// Connect to `address` and authenticate with `token`
    pub async fn connect(address: &str, token: &str) -> Result<Self, TunnelError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| TunnelError::Unavailable(format!("connect to {}: {}", address, e)))?;
        Self::authenticate(stream, token).await
    }

    /// Keep trying to connect until `window` has elapsed.
    ///
    /// A freshly spawned runner needs a moment before its control socket accepts.
    /// Only the TCP connect is retried; a rejected token fails immediately.
    pub async fn connect_with_retry(
        address: &str,
        token: &str,
        window: Duration,
    ) -> Result<Self, TunnelError> {
        let deadline = tokio::time::Instant::now() + window;
        let mut delay = Duration::from_millis(25);

        loop {
            match TcpStream::connect(address).await {
                Ok(stream) => return Self::authenticate(stream, token).await,
                Err(e) if tokio::time::Instant::now() < deadline => {
                    tracing::trace!("Runner not ready yet: {}", e);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_millis(500));
                }
                Err(e) => {
                    return Err(TunnelError::Unavailable(format!(
                        "connect to {}: {}",
                        address, e
                    )))
                }
            }
        }
    }

    async fn authenticate(stream: TcpStream, token: &str) -> Result<Self, TunnelError> {
        let mut client = Self {
            framed: Framed::new(stream, ControlCodec::new()),
        };

        match client
            .request(ControlRequest::Authenticate {
                token: token.to_string(),
            })
            .await?
        {
            ControlResponse::Authenticated => Ok(client),
            other => Err(unexpected(other)),
        }
    }

    /// Send one request and wait for its response
    pub async fn request(&mut self, request: ControlRequest) -> Result<ControlResponse, TunnelError> {
        self.framed
            .send(ControlFrame::Request(request))
            .await
            .map_err(|e| TunnelError::Unavailable(format!("send control request: {}", e)))?;

        match self.framed.next().await {
            Some(Ok(ControlFrame::Response(response))) => Ok(response),
            Some(Ok(ControlFrame::Request(_))) => Err(TunnelError::Unavailable(
                "runner sent a request frame".to_string(),
            )),
            Some(Err(e)) => Err(TunnelError::Unavailable(format!("read control response: {}", e))),
            None => Err(TunnelError::Unavailable("runner closed the control connection".to_string())),
        }
    }

    /// Ask the runner to start the engine from the bridged configuration
    pub async fn start(&mut self) -> Result<(), TunnelError> {
        match self.request(ControlRequest::Start).await? {
            ControlResponse::Started => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the runner to stop the engine
    pub async fn stop(&mut self) -> Result<(), TunnelError> {
        match self.request(ControlRequest::Stop).await? {
            ControlResponse::Stopped => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Status probe
    pub async fn status(&mut self) -> Result<RunnerStatus, TunnelError> {
        match self.request(ControlRequest::Status).await? {
            ControlResponse::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: ControlResponse) -> TunnelError {
    match response {
        ControlResponse::Error { kind, message } => match kind {
            ControlErrorKind::Configuration => TunnelError::Configuration(message),
            ControlErrorKind::InvalidConfiguration => TunnelError::InvalidConfiguration(message),
            ControlErrorKind::Engine => TunnelError::Engine(message),
            ControlErrorKind::Unauthorized => {
                TunnelError::Unavailable(format!("runner rejected credentials: {}", message))
            }
        },
        other => TunnelError::Unavailable(format!("unexpected runner response: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_tunnel_errors() {
        let err = unexpected(ControlResponse::error(ControlErrorKind::Engine, "utun busy"));
        assert_eq!(err, TunnelError::Engine("utun busy".into()));

        let err = unexpected(ControlResponse::error(ControlErrorKind::Configuration, "empty"));
        assert_eq!(err, TunnelError::Configuration("empty".into()));

        let err = unexpected(ControlResponse::Stopped);
        assert!(matches!(err, TunnelError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = ControlClient::connect_with_retry(&address, "token", Duration::from_millis(100)).await;
        assert!(matches!(result, Err(TunnelError::Unavailable(_))));
    }
}
