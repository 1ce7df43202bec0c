//! Hand-off of a tunnel configuration between two independently constructed
//! bridges, the way the orchestrator and runner processes each build their own.

use mg_core::bridge::{installation_key, SecretBridge};
use mg_core::config::BridgeBackend;
use mg_core::error::BridgeError;
use mg_protocol::TunnelConfig;
use tempfile::tempdir;

const CONFIG_TEXT: &str = "\
[Interface]
PrivateKey = AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=
Address = 10.100.0.9/32
DNS = 1.1.1.1, 9.9.9.9

[Peer]
PublicKey = AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=
AllowedIPs = 0.0.0.0/0, ::/0
Endpoint = fra.relay.example:51820
PersistentKeepalive = 25
";

#[test]
fn test_runner_reads_what_orchestrator_published() {
    let dir = tempdir().unwrap();
    let config = TunnelConfig::parse(CONFIG_TEXT).unwrap();

    let writer = SecretBridge::for_installation(BridgeBackend::File, dir.path());
    writer.publish(&config).unwrap();

    let reader = SecretBridge::for_installation(BridgeBackend::File, dir.path());
    assert_eq!(reader.key(), installation_key(dir.path()));
    assert_eq!(reader.fetch().unwrap(), config);

    writer.clear();
    assert!(matches!(reader.fetch(), Err(BridgeError::Missing)));
}

#[test]
fn test_installations_are_isolated() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();

    let config = TunnelConfig::parse(CONFIG_TEXT).unwrap();
    SecretBridge::for_installation(BridgeBackend::File, first.path())
        .publish(&config)
        .unwrap();

    let other = SecretBridge::for_installation(BridgeBackend::File, second.path());
    assert!(matches!(other.fetch(), Err(BridgeError::Missing)));
}

#[test]
fn test_republish_replaces_previous_session() {
    let dir = tempdir().unwrap();
    let bridge = SecretBridge::for_installation(BridgeBackend::File, dir.path());

    let first = TunnelConfig::parse(CONFIG_TEXT).unwrap();
    let mut second = first.clone();
    second.interface.address = "10.200.0.4".to_string();
    second.peers.clear();

    bridge.publish(&first).unwrap();
    bridge.publish(&second).unwrap();
    assert_eq!(bridge.fetch().unwrap(), second);
}
