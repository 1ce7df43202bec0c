//! Output formatting for the CLI
//!
//! Tables for networks, devices and relays, a one-screen session summary, and
//! colored status lines.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use mg_core::types::{Device, Network, Relay, RelayStatus};
use mg_orchestrator::SessionSnapshot;

/// Format networks as a table
pub fn format_networks(networks: &[Network]) -> String {
    if networks.is_empty() {
        return "No networks".to_string();
    }

    #[derive(Tabled)]
    struct NetworkRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "RANGE")]
        range: String,
        #[tabled(rename = "DEVICES")]
        devices: u32,
        #[tabled(rename = "DESCRIPTION")]
        description: String,
    }

    let rows: Vec<NetworkRow> = networks
        .iter()
        .map(|n| NetworkRow {
            id: n.id.to_string(),
            name: n.name.clone(),
            range: n.ip_range.clone(),
            devices: n.device_count,
            description: n.description.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Format the devices of a network.
///
/// `this_device` marks the row of the machine running the CLI.
pub fn format_devices(devices: &[Device], this_device: &str) -> String {
    if devices.is_empty() {
        return "No devices".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "IP")]
        ip: String,
        #[tabled(rename = "PLATFORM")]
        platform: String,
        #[tabled(rename = "ONLINE")]
        online: String,
        #[tabled(rename = "EXIT NODE")]
        exit_node: String,
    }

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| DeviceRow {
            id: truncate(d.id.as_str(), 12),
            name: if d.is_this_client(this_device) {
                format!("{} (this device)", d.name)
            } else {
                d.name.clone()
            },
            ip: d.ip_address.clone(),
            platform: d.platform.as_str().to_ascii_lowercase(),
            online: yes_no(d.is_online),
            exit_node: yes_no(d.is_exit_node),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn format_relays(relays: &[Relay]) -> String {
    if relays.is_empty() {
        return "No relays available".to_string();
    }

    #[derive(Tabled)]
    struct RelayRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "LOCATION")]
        location: String,
        #[tabled(rename = "ENDPOINT")]
        endpoint: String,
        #[tabled(rename = "STATUS")]
        status: String,
    }

    let rows: Vec<RelayRow> = relays
        .iter()
        .map(|r| RelayRow {
            id: r.id.to_string(),
            name: r.name.clone(),
            location: format!("{} ({})", r.location, r.country_code),
            endpoint: r.public_endpoint.clone(),
            status: match r.status {
                RelayStatus::Online => "online".to_string(),
                RelayStatus::Offline => "offline".to_string(),
            },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Multi-line session summary
pub fn format_session(snapshot: &SessionSnapshot) -> String {
    let mut output = String::new();

    output.push_str(&format!("Session: {}\n", snapshot.status));
    if let Some(network) = &snapshot.network {
        output.push_str(&format!("Network: {}\n", network));
    }
    output.push_str(&format!("Exit node: {}\n", snapshot.exit_node));
    if let Some(device) = &snapshot.device {
        output.push_str(&format!("Device: {} ({})\n", device.name, device.ip_address));
    }
    output.push_str(&format!(
        "Tunnel: {}\n",
        match (snapshot.connected, snapshot.connecting) {
            (true, _) => "up",
            (false, true) => "connecting",
            (false, false) => "down",
        }
    ));
    if let Some(error) = &snapshot.last_error {
        output.push_str(&format!("Last error: {}\n", error.user_message()));
    }

    output
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_styled(std::io::stdout(), crossterm::style::Color::Green, "✓ ", msg);
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    print_styled(std::io::stderr(), crossterm::style::Color::Red, "✗ ", msg);
}

pub fn print_warning(msg: &str) {
    print_styled(std::io::stderr(), crossterm::style::Color::Yellow, "⚠ ", msg);
}

pub fn print_info(msg: &str) {
    print_styled(std::io::stdout(), crossterm::style::Color::Cyan, "ℹ ", msg);
}

fn print_styled(mut out: impl std::io::Write, color: crossterm::style::Color, prefix: &str, msg: &str) {
    use crossterm::style::{Print, ResetColor, SetForegroundColor};

    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(prefix),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_core::error::SessionError;
    use mg_core::types::{DeviceId, NetworkId, Platform};
    use mg_orchestrator::SessionStatus;

    #[test]
    fn test_empty_tables() {
        assert_eq!(format_networks(&[]), "No networks");
        assert_eq!(format_devices(&[], "laptop"), "No devices");
        assert_eq!(format_relays(&[]), "No relays available");
    }

    #[test]
    fn test_this_device_marked() {
        let devices = vec![Device {
            id: DeviceId::new("d1"),
            name: "laptop".into(),
            ip_address: "10.100.0.2".into(),
            platform: Platform::Desktop,
            public_key: String::new(),
            is_exit_node: false,
            is_online: true,
            network_id: NetworkId::new("n1"),
        }];

        let table = format_devices(&devices, "laptop");
        assert!(table.contains("laptop (this device)"));
        assert!(table.contains("10.100.0.2"));
    }

    #[test]
    fn test_session_summary_shows_error() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::Failed(SessionError::Network("timeout".into())),
            network: Some(NetworkId::new("n1")),
            last_error: Some(SessionError::Network("timeout".into())),
            ..Default::default()
        };

        let summary = format_session(&snapshot);
        assert!(summary.contains("Network: n1"));
        assert!(summary.contains("Tunnel: down"));
        assert!(summary.contains("Could not reach the mesh service: timeout"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 12), "short");
        assert_eq!(truncate("0123456789abcdef", 12), "012345678...");
    }
}
