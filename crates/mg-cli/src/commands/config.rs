//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_info, print_success, print_warning};
use mg_core::config::{self, ClientConfig};

fn resolve(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(config::default_config_path)
}

/// Print the effective configuration. The API token is never shown.
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = resolve(config_path);

    if !path.exists() {
        print_info(&format!("No config file at {}, showing defaults", path.display()));
    }

    let mut config: ClientConfig = config::load_config_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if config.api_token.is_some() {
        config.api_token = Some("[PRESENT]".to_string());
    }

    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Write a default configuration file
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = resolve(config_path);

    if path.exists() && !force {
        print_warning(&format!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        ));
        return Ok(());
    }

    let mut config = ClientConfig::default();
    if let Some(parent) = path.parent() {
        config.state_dir = parent.to_path_buf();
    }

    config::save_config(&path, &config)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    print_success(&format!("Created {}", path.display()));
    Ok(())
}

/// Set a top-level key, rejecting values the client config would not load
pub fn config_set(config_path: Option<&PathBuf>, key: &str, value: &str) -> Result<()> {
    let path = resolve(config_path);

    let mut table: toml::Table = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")?
    } else {
        toml::Table::new()
    };

    if !known_key(key) {
        anyhow::bail!("Unknown config key: {}", key);
    }
    table.insert(key.to_string(), parse_value(value));

    // Must still load as a client config
    toml::Value::Table(table.clone())
        .try_into::<ClientConfig>()
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;

    write_table(&path, &table)?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

pub fn config_path(config_path: Option<&PathBuf>) {
    println!("{}", resolve(config_path).display());
}

fn known_key(key: &str) -> bool {
    matches!(
        key,
        "api_base_url"
            | "api_token"
            | "device_name"
            | "control_port"
            | "runner_path"
            | "state_dir"
            | "bridge"
            | "start_timeout"
            | "status_channel_capacity"
    )
}

fn parse_value(value: &str) -> toml::Value {
    if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else if value == "true" || value == "false" {
        toml::Value::Boolean(value == "true")
    } else {
        toml::Value::String(value.to_string())
    }
}

fn write_table(path: &Path, table: &toml::Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, toml::to_string_pretty(table)?)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_then_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        config_init(Some(&path), false).unwrap();
        config_set(Some(&path), "control_port", "23000").unwrap();
        config_set(Some(&path), "bridge", "keyring").unwrap();

        let config: ClientConfig = config::load_config(&path).unwrap();
        assert_eq!(config.control_port, 23000);
        assert_eq!(config.bridge, config::BridgeBackend::Keyring);
        assert_eq!(config.state_dir, dir.path());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(config_set(Some(&path), "control_port", "not-a-port").is_err());
        assert!(config_set(Some(&path), "bridge", "floppy").is_err());
        assert!(config_set(Some(&path), "colour", "blue").is_err());
        assert!(!path.exists());
    }
}
