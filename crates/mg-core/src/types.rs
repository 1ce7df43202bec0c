//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the raw ID string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Backend identifier of a mesh network
    NetworkId
);
string_id!(
    /// Backend identifier of a device
    DeviceId
);
string_id!(
    /// Backend identifier of a provider relay
    RelayId
);

/// A mesh network the user belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// CIDR address range, e.g. `10.100.0.0/24`
    pub ip_range: String,
    #[serde(default)]
    pub device_count: u32,
}

/// Device platform tag as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Desktop,
    Macos,
    Windows,
    Linux,
    Router,
    Firewall,
    Server,
    #[serde(other)]
    Other,
}

impl Platform {
    /// Platform this client registers itself with
    pub fn current() -> Self {
        Platform::Desktop
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Desktop => "DESKTOP",
            Platform::Macos => "MACOS",
            Platform::Windows => "WINDOWS",
            Platform::Linux => "LINUX",
            Platform::Router => "ROUTER",
            Platform::Firewall => "FIREWALL",
            Platform::Server => "SERVER",
            Platform::Other => "OTHER",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device registered in a mesh network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub ip_address: String,
    pub platform: Platform,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub is_exit_node: bool,
    #[serde(default)]
    pub is_online: bool,
    /// Owning network. Filled in by the backend client when the payload omits it.
    #[serde(default)]
    pub network_id: NetworkId,
}

impl Device {
    /// Whether this entry is plausibly the machine we are running on
    pub fn is_this_client(&self, device_name: &str) -> bool {
        self.platform == Platform::current() && self.name == device_name
    }
}

/// Relay availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Online,
    #[serde(other)]
    Offline,
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayStatus::Online => write!(f, "online"),
            RelayStatus::Offline => write!(f, "offline"),
        }
    }
}

/// A provider-operated exit relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    pub id: RelayId,
    pub name: String,
    pub location: String,
    /// ISO 3166 alpha-2
    pub country_code: String,
    pub public_endpoint: String,
    pub status: RelayStatus,
}

/// Where tunnel traffic leaves the mesh
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ExitNodeSelection {
    /// Mesh-only, no default route
    #[default]
    None,
    Relay(RelayId),
    Device(DeviceId),
}

impl ExitNodeSelection {
    /// Backend representation: `(exitNodeType, exitNodeId)`
    pub fn to_wire(&self) -> ExitNodeAssignment {
        let (exit_node_type, exit_node_id) = match self {
            ExitNodeSelection::None => ("none", None),
            ExitNodeSelection::Relay(id) => ("relay", Some(id.0.clone())),
            ExitNodeSelection::Device(id) => ("device", Some(id.0.clone())),
        };
        ExitNodeAssignment {
            exit_node_type: exit_node_type.to_string(),
            exit_node_id,
        }
    }

    pub fn from_wire(wire: ExitNodeAssignment) -> Result<Self, String> {
        match (wire.exit_node_type.to_ascii_lowercase().as_str(), wire.exit_node_id) {
            ("none", _) => Ok(ExitNodeSelection::None),
            ("relay", Some(id)) if !id.is_empty() => Ok(ExitNodeSelection::Relay(RelayId(id))),
            ("device", Some(id)) if !id.is_empty() => Ok(ExitNodeSelection::Device(DeviceId(id))),
            (kind @ ("relay" | "device"), _) => Err(format!("exit node type {} requires an id", kind)),
            (other, _) => Err(format!("unknown exit node type: {}", other)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ExitNodeSelection::None)
    }
}

impl fmt::Display for ExitNodeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitNodeSelection::None => write!(f, "none"),
            ExitNodeSelection::Relay(id) => write!(f, "relay:{}", id),
            ExitNodeSelection::Device(id) => write!(f, "device:{}", id),
        }
    }
}

/// Parses `none`, `relay:<id>` or `device:<id>`
impl FromStr for ExitNodeSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(ExitNodeSelection::None);
        }

        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected none, relay:<id> or device:<id>, got '{}'", s))?;

        Self::from_wire(ExitNodeAssignment {
            exit_node_type: kind.to_string(),
            exit_node_id: Some(id.trim().to_string()),
        })
    }
}

/// Exit-node assignment as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitNodeAssignment {
    pub exit_node_type: String,
    pub exit_node_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_selection_from_str() {
        assert_eq!("none".parse::<ExitNodeSelection>().unwrap(), ExitNodeSelection::None);
        assert_eq!(
            "relay:r-fra".parse::<ExitNodeSelection>().unwrap(),
            ExitNodeSelection::Relay(RelayId::new("r-fra"))
        );
        assert_eq!(
            "device:d1".parse::<ExitNodeSelection>().unwrap(),
            ExitNodeSelection::Device(DeviceId::new("d1"))
        );
        assert!("relay:".parse::<ExitNodeSelection>().is_err());
        assert!("gateway:x".parse::<ExitNodeSelection>().is_err());
        assert!("d1".parse::<ExitNodeSelection>().is_err());
    }

    #[test]
    fn test_exit_selection_wire() {
        let wire = ExitNodeSelection::Device(DeviceId::new("d1")).to_wire();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json, serde_json::json!({"exitNodeType": "device", "exitNodeId": "d1"}));

        let none = ExitNodeSelection::None.to_wire();
        assert_eq!(none.exit_node_id, None);
        assert_eq!(ExitNodeSelection::from_wire(none).unwrap(), ExitNodeSelection::None);
    }

    #[test]
    fn test_device_deserialize() {
        let json = r#"{
            "id": "d1",
            "name": "studio",
            "ip_address": "10.100.0.7",
            "public_key": "abc=",
            "is_online": true,
            "is_exit_node": true,
            "platform": "ROUTER"
        }"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.platform, Platform::Router);
        assert!(device.is_exit_node);
        assert_eq!(device.network_id, NetworkId::default());
    }

    #[test]
    fn test_unknown_platform_is_other() {
        let platform: Platform = serde_json::from_str(r#""TOASTER""#).unwrap();
        assert_eq!(platform, Platform::Other);
        assert_eq!(Platform::current().to_string(), "DESKTOP");
    }

    #[test]
    fn test_relay_status() {
        let json = r#"{
            "id": "r1", "name": "Frankfurt", "location": "Frankfurt, DE",
            "country_code": "DE", "public_endpoint": "fra.relay.example:51820",
            "status": "maintenance"
        }"#;
        let relay: Relay = serde_json::from_str(json).unwrap();
        assert_eq!(relay.status, RelayStatus::Offline);
    }
}
