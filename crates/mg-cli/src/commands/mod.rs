//! CLI command implementations

mod config;
mod mesh;
mod status;
mod up;

pub use config::{config_init, config_path, config_set, config_show};
pub use mesh::{backend_from_config, devices_command, exit_node_get, exit_node_set, networks_command, relays_command};
pub use status::status_command;
pub use up::up_command;
