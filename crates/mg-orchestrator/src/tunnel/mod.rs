//! Desktop tunnel controller: an out-of-process runner driven over a localhost control socket

mod control_client;
mod process;

pub use control_client::ControlClient;
pub use process::{default_runner_path, ProcessTunnelController};
