//! Localhost control socket the orchestrator drives the runner through

mod server;

pub use server::ControlServer;
