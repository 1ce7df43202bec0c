//! Engine-level tunnel description built from a decoded [`TunnelConfig`]

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use base64::Engine as _;
use thiserror::Error;

use mg_protocol::{PeerSection, TunnelConfig};

/// The bridged configuration could not be turned into an engine description
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptionError {
    #[error("invalid {field}: {reason}")]
    InvalidKey { field: &'static str, reason: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid DNS server: {0}")]
    InvalidDns(String),
}

/// 32 bytes of Curve25519 key material
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial([u8; 32]);

impl KeyMaterial {
    pub fn from_base64(field: &'static str, value: &str) -> Result<Self, DescriptionError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(value.trim())
            .map_err(|e| DescriptionError::InvalidKey {
                field,
                reason: e.to_string(),
            })?;

        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| DescriptionError::InvalidKey {
            field,
            reason: format!("expected 32 bytes, got {}", b.len()),
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[PRESENT]")
    }
}

/// An address with its prefix length, e.g. `10.100.0.5/32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpBlock {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl IpBlock {
    fn max_prefix(addr: &IpAddr) -> u8 {
        match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }
}

impl FromStr for IpBlock {
    type Err = String;

    /// A bare address gets a host prefix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr: IpAddr = addr.trim().parse().map_err(|_| format!("not an IP address: {}", s))?;
        let max = Self::max_prefix(&addr);
        let prefix = match prefix {
            Some(p) => p
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| format!("bad prefix length: {}", s))?,
            None => max,
        };

        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for IpBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescription {
    pub public_key: KeyMaterial,
    pub preshared_key: Option<KeyMaterial>,
    pub allowed_ips: Vec<IpBlock>,
    pub endpoint: Option<String>,
    pub persistent_keepalive: Option<u16>,
}

/// What the tunnel engine is started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub private_key: KeyMaterial,
    /// Interface address as a host block
    pub address: IpBlock,
    pub dns: Vec<IpAddr>,
    pub listen_port: Option<u16>,
    pub peers: Vec<PeerDescription>,
}

impl EngineConfig {
    pub fn from_tunnel_config(config: &TunnelConfig) -> Result<Self, DescriptionError> {
        let interface = &config.interface;
        let private_key = KeyMaterial::from_base64("private key", &interface.private_key)?;

        let address = interface
            .address
            .parse::<IpBlock>()
            .map_err(DescriptionError::InvalidAddress)?;

        let dns = interface
            .dns
            .iter()
            .map(|server| {
                server
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| DescriptionError::InvalidDns(server.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let peers = config
            .peers
            .iter()
            .map(describe_peer)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            private_key,
            address,
            dns,
            listen_port: interface.listen_port,
            peers,
        })
    }
}

fn describe_peer(peer: &PeerSection) -> Result<PeerDescription, DescriptionError> {
    let public_key = KeyMaterial::from_base64("public key", &peer.public_key)?;
    let preshared_key = match peer.preshared_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Some(KeyMaterial::from_base64("preshared key", key)?),
        _ => None,
    };

    let mut allowed_ips = Vec::new();
    for entry in &peer.allowed_ips {
        match entry.parse::<IpBlock>() {
            Ok(block) => allowed_ips.push(block),
            Err(reason) => tracing::warn!("Skipping allowed IP entry: {}", reason),
        }
    }

    Ok(PeerDescription {
        public_key,
        preshared_key,
        allowed_ips,
        endpoint: peer.endpoint.clone(),
        persistent_keepalive: peer.persistent_keepalive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 32 zero bytes and 32 0x01 bytes
    const KEY_A: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
    const KEY_B: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=";

    fn sample() -> TunnelConfig {
        TunnelConfig::parse(&format!(
            "[Interface]\nPrivateKey = {KEY_A}\nAddress = 10.100.0.5/24\nDNS = 1.1.1.1, 9.9.9.9\n\n\
             [Peer]\nPublicKey = {KEY_B}\nAllowedIPs = 0.0.0.0/0, ::/0, not-an-ip\nEndpoint = relay.example:51820\nPersistentKeepalive = 25\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_engine_config_from_tunnel_config() {
        let engine = EngineConfig::from_tunnel_config(&sample()).unwrap();

        assert_eq!(engine.private_key.as_bytes(), &[0u8; 32]);
        assert_eq!(engine.address.to_string(), "10.100.0.5/32");
        assert_eq!(engine.dns.len(), 2);

        let peer = &engine.peers[0];
        assert_eq!(peer.public_key.as_bytes(), &[1u8; 32]);
        assert_eq!(peer.allowed_ips.len(), 2, "unparseable entry skipped");
        assert_eq!(peer.endpoint.as_deref(), Some("relay.example:51820"));
        assert_eq!(peer.persistent_keepalive, Some(25));
    }

    #[test]
    fn test_short_key_rejected() {
        let err = KeyMaterial::from_base64("private key", "AAAA").unwrap_err();
        assert!(matches!(err, DescriptionError::InvalidKey { field: "private key", .. }));
    }

    #[test]
    fn test_bad_address_rejected() {
        let mut config = sample();
        config.interface.address = "10.100.0.500".to_string();
        assert!(matches!(
            EngineConfig::from_tunnel_config(&config),
            Err(DescriptionError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_ip_block_prefix_bounds() {
        assert!("10.0.0.1/33".parse::<IpBlock>().is_err());
        assert_eq!("10.0.0.1".parse::<IpBlock>().unwrap().prefix, 32);
        assert_eq!("fd00::5".parse::<IpBlock>().unwrap().prefix, 128);
        assert_eq!("::/0".parse::<IpBlock>().unwrap().prefix, 0);
    }

    #[test]
    fn test_key_debug_redacted() {
        let engine = EngineConfig::from_tunnel_config(&sample()).unwrap();
        let rendered = format!("{:?}", engine);
        assert!(rendered.contains("[PRESENT]"));
        assert!(!rendered.contains(KEY_A));
    }
}
