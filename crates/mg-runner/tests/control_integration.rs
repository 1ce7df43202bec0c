//! Control socket integration tests
//!
//! Runs a control server over a memory-backed bridge and drives it with the
//! orchestrator's control client.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use mg_core::bridge::MemorySecretStore;
use mg_core::error::TunnelError;
use mg_core::SecretBridge;
use mg_orchestrator::tunnel::ControlClient;
use mg_protocol::{ControlCodec, ControlErrorKind, ControlFrame, ControlRequest, ControlResponse, RunnerStatus, TunnelConfig};
use mg_runner::{ControlServer, DryRunEngine, TunnelAdapter};

const TOKEN: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
const KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

struct Runner {
    address: String,
    bridge: SecretBridge,
    shutdown: tokio_util::sync::CancellationToken,
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_runner() -> Runner {
    let bridge = SecretBridge::new(Arc::new(MemorySecretStore::new()), "tunnel-config-test");
    let adapter = Arc::new(TunnelAdapter::new(bridge.clone(), Arc::new(DryRunEngine::default())));

    let server = ControlServer::bind("127.0.0.1:0", adapter, TOKEN.to_string())
        .await
        .expect("bind control socket");
    let address = server.local_addr().unwrap().to_string();
    let shutdown = server.shutdown_token();
    tokio::spawn(server.run());

    Runner {
        address,
        bridge,
        shutdown,
    }
}

fn publish_valid(bridge: &SecretBridge) {
    let config = TunnelConfig::parse(&format!(
        "[Interface]\nPrivateKey = {KEY}\nAddress = 10.100.0.5\nDNS = 1.1.1.1\n\n\
         [Peer]\nPublicKey = {KEY}\nAllowedIPs = 10.100.0.0/24\nEndpoint = relay.example:51820\n"
    ))
    .unwrap();
    bridge.publish(&config).unwrap();
}

#[tokio::test]
async fn test_start_status_stop() {
    let runner = start_runner().await;
    publish_valid(&runner.bridge);

    let mut client = ControlClient::connect_with_retry(&runner.address, TOKEN, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(client.status().await.unwrap(), RunnerStatus::Disconnected);
    client.start().await.unwrap();
    assert_eq!(client.status().await.unwrap(), RunnerStatus::Connected);

    // A second connection sees the same engine
    let mut probe = ControlClient::connect(&runner.address, TOKEN).await.unwrap();
    assert_eq!(probe.status().await.unwrap(), RunnerStatus::Connected);

    client.stop().await.unwrap();
    assert_eq!(probe.status().await.unwrap(), RunnerStatus::Disconnected);
}

#[tokio::test]
async fn test_start_with_empty_bridge() {
    let runner = start_runner().await;

    let mut client = ControlClient::connect(&runner.address, TOKEN).await.unwrap();
    let err = client.start().await.unwrap_err();

    assert!(matches!(err, TunnelError::Configuration(_)));
    assert_eq!(client.status().await.unwrap(), RunnerStatus::Disconnected);
}

#[tokio::test]
async fn test_undecodable_key_is_invalid_configuration() {
    let runner = start_runner().await;
    let mut config = TunnelConfig::parse(&format!(
        "[Interface]\nPrivateKey = {KEY}\nAddress = 10.100.0.5\n"
    ))
    .unwrap();
    config.interface.private_key = "c2hvcnQ=".to_string();
    runner.bridge.publish(&config).unwrap();

    let mut client = ControlClient::connect(&runner.address, TOKEN).await.unwrap();
    let err = client.start().await.unwrap_err();
    assert!(matches!(err, TunnelError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_wrong_token_rejected() {
    let runner = start_runner().await;

    let result = ControlClient::connect(&runner.address, "not-the-token").await;
    assert!(matches!(result, Err(TunnelError::Unavailable(_))));
}

#[tokio::test]
async fn test_requests_before_authentication_rejected() {
    let runner = start_runner().await;

    let stream = TcpStream::connect(&runner.address).await.unwrap();
    let mut framed = Framed::new(stream, ControlCodec::new());

    framed
        .send(ControlFrame::Request(ControlRequest::Status))
        .await
        .unwrap();
    let response = tokio::time::timeout(Duration::from_secs(2), framed.next())
        .await
        .expect("timed out")
        .expect("connection closed")
        .unwrap();

    match response {
        ControlFrame::Response(ControlResponse::Error { kind, .. }) => {
            assert_eq!(kind, ControlErrorKind::Unauthorized);
        }
        other => panic!("expected unauthorized error, got {:?}", other),
    }
}
