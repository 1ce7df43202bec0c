//! Session orchestration
//!
//! One task owns the [`Session`](state::Session). Callers talk to it through an
//! [`OrchestratorHandle`]; tunnel status notifications reach it through the same
//! command channel, so every mutation happens in one place.

mod actor;
pub(crate) mod state;

pub(crate) use actor::Command;
pub use actor::{spawn, Collaborators, OrchestratorHandle};
pub use state::{DisconnectOutcome, SessionSnapshot, SessionStatus};
