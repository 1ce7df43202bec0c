//! Tunnel configuration codec
//!
//! Converts between the INI-like text the backend serves for a device and
//! the structured [`TunnelConfig`]:
//!
//! ```text
//! [Interface]
//! PrivateKey = <base64>
//! Address = 10.100.0.2
//! DNS = 1.1.1.1, 1.0.0.1
//!
//! [Peer]
//! PublicKey = <base64>
//! AllowedIPs = 10.100.0.0/24
//! Endpoint = relay.example.com:51820
//! PersistentKeepalive = 25
//! ```
//!
//! Keys and section names are matched case-insensitively. Blank lines and
//! lines starting with `#` are ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// The `[Interface]` section: the local end of the tunnel
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSection {
    /// Base64 private key
    pub private_key: String,
    /// Local tunnel address, without prefix length
    pub address: String,
    /// DNS resolvers (empty when the config has none)
    #[serde(default)]
    pub dns: Vec<String>,
    /// Fixed UDP listen port
    #[serde(default)]
    pub listen_port: Option<u16>,
}

/// A `[Peer]` section
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSection {
    /// Base64 public key of the peer
    pub public_key: String,
    /// IP ranges routed to this peer
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    /// `host:port` the peer is reachable at
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Keepalive interval in seconds. Never `Some(0)`; zero means no keepalive.
    #[serde(default)]
    pub persistent_keepalive: Option<u16>,
    /// Base64 preshared key
    #[serde(default)]
    pub preshared_key: Option<String>,
}

/// Structured tunnel configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Local interface settings
    pub interface: InterfaceSection,
    /// Peers in the order they appeared
    #[serde(default)]
    pub peers: Vec<PeerSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Interface,
    Peer,
    Unknown,
}

impl TunnelConfig {
    /// Parse configuration text.
    ///
    /// Peers without a public key are dropped. Fails with
    /// [`ProtocolError::MalformedConfig`] when the interface has no private
    /// key or no address.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut interface = InterfaceSection::default();
        let mut peers = Vec::new();
        let mut current_peer: Option<PeerSection> = None;
        let mut section = Section::None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = section_name(line) {
                flush_peer(&mut current_peer, &mut peers);
                section = if name.eq_ignore_ascii_case("interface") {
                    Section::Interface
                } else if name.eq_ignore_ascii_case("peer") {
                    current_peer = Some(PeerSection::default());
                    Section::Peer
                } else {
                    tracing::debug!(section = name, "Ignoring unknown config section");
                    Section::Unknown
                };
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match section {
                Section::Interface => apply_interface_key(&mut interface, &key, value),
                Section::Peer => {
                    if let Some(peer) = current_peer.as_mut() {
                        apply_peer_key(peer, &key, value);
                    }
                }
                Section::None | Section::Unknown => {}
            }
        }

        flush_peer(&mut current_peer, &mut peers);

        if interface.private_key.is_empty() {
            return Err(ProtocolError::MalformedConfig(
                "interface has no PrivateKey".to_string(),
            ));
        }
        if interface.address.is_empty() {
            return Err(ProtocolError::MalformedConfig(
                "interface has no Address".to_string(),
            ));
        }

        Ok(Self { interface, peers })
    }

    /// Render the configuration back to text
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl FromStr for TunnelConfig {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TunnelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let iface = &self.interface;
        writeln!(f, "[Interface]")?;
        writeln!(f, "PrivateKey = {}", iface.private_key)?;
        writeln!(f, "Address = {}", iface.address)?;
        if !iface.dns.is_empty() {
            writeln!(f, "DNS = {}", iface.dns.join(", "))?;
        }
        if let Some(port) = iface.listen_port {
            writeln!(f, "ListenPort = {}", port)?;
        }

        for peer in &self.peers {
            writeln!(f)?;
            writeln!(f, "[Peer]")?;
            writeln!(f, "PublicKey = {}", peer.public_key)?;
            if let Some(psk) = &peer.preshared_key {
                writeln!(f, "PresharedKey = {}", psk)?;
            }
            if !peer.allowed_ips.is_empty() {
                writeln!(f, "AllowedIPs = {}", peer.allowed_ips.join(", "))?;
            }
            if let Some(endpoint) = &peer.endpoint {
                writeln!(f, "Endpoint = {}", endpoint)?;
            }
            if let Some(keepalive) = peer.persistent_keepalive.filter(|k| *k > 0) {
                writeln!(f, "PersistentKeepalive = {}", keepalive)?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for InterfaceSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceSection")
            .field("private_key", &redact(&self.private_key))
            .field("address", &self.address)
            .field("dns", &self.dns)
            .field("listen_port", &self.listen_port)
            .finish()
    }
}

impl fmt::Debug for PeerSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSection")
            .field("public_key", &self.public_key)
            .field("allowed_ips", &self.allowed_ips)
            .field("endpoint", &self.endpoint)
            .field("persistent_keepalive", &self.persistent_keepalive)
            .field("preshared_key", &self.preshared_key.as_deref().map(redact))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "[MISSING]"
    } else {
        "[PRESENT]"
    }
}

/// Return the name inside a `[Name]` header line
fn section_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

fn flush_peer(current: &mut Option<PeerSection>, peers: &mut Vec<PeerSection>) {
    if let Some(peer) = current.take() {
        if peer.public_key.is_empty() {
            tracing::debug!("Dropping peer section without PublicKey");
        } else {
            peers.push(peer);
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_interface_key(iface: &mut InterfaceSection, key: &str, value: &str) {
    match key {
        "privatekey" => iface.private_key = value.to_string(),
        "address" => {
            // First address only, prefix length dropped
            let first = value.split(',').next().unwrap_or("").trim();
            iface.address = first.split('/').next().unwrap_or("").trim().to_string();
        }
        "dns" => iface.dns = split_list(value),
        "listenport" => iface.listen_port = value.parse().ok(),
        _ => tracing::trace!(key, "Ignoring unknown interface key"),
    }
}

fn apply_peer_key(peer: &mut PeerSection, key: &str, value: &str) {
    match key {
        "publickey" => peer.public_key = value.to_string(),
        "allowedips" => peer.allowed_ips = split_list(value),
        "endpoint" => peer.endpoint = Some(value.to_string()).filter(|v| !v.is_empty()),
        "persistentkeepalive" => {
            peer.persistent_keepalive = value.parse::<u16>().ok().filter(|k| *k > 0);
        }
        "presharedkey" => peer.preshared_key = Some(value.to_string()).filter(|v| !v.is_empty()),
        _ => tracing::trace!(key, "Ignoring unknown peer key"),
    }
}
