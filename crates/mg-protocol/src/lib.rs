//! mg-protocol: Wire formats for meshgate
//!
//! This crate defines the two formats that cross a boundary:
//! - the INI-like tunnel configuration text served by the backend
//! - the length-prefixed control protocol spoken between the orchestrator
//!   process and the isolated tunnel-runner process

pub mod codec;
pub mod control;
pub mod error;
pub mod frame;
pub mod tunnel_config;

pub use codec::{ControlCodec, ControlFrame};
pub use control::{ControlErrorKind, ControlRequest, ControlResponse, RunnerStatus};
pub use error::ProtocolError;
pub use frame::{FrameHeader, FrameKind, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use tunnel_config::{InterfaceSection, PeerSection, TunnelConfig};
