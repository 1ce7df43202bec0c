//! mg-orchestrator: VPN session orchestration for meshgate
//!
//! The orchestrator owns the single current session. It sequences device
//! registration, exit-node assignment and configuration retrieval against the
//! mesh backend, hands the configuration to the tunnel runner through the secret
//! bridge, and folds tunnel status notifications back into the session.

pub mod api;
pub mod observer;
pub mod session;
pub mod tunnel;

pub use api::HttpBackend;
pub use session::{
    spawn, Collaborators, DisconnectOutcome, OrchestratorHandle, SessionSnapshot, SessionStatus,
};
pub use tunnel::ProcessTunnelController;
