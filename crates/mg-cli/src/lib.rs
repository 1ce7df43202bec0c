//! mg-cli: command-line front end for meshgate
//!
//! Provides the `meshgate` binary: browse networks, devices and relays, manage
//! the exit node, and bring the tunnel up with `meshgate up`.

pub mod commands;
pub mod output;
