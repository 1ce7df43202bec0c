//! Collaborator trait definitions

mod backend;
mod secret_store;
mod tunnel;

pub use backend::BackendClient;
pub use secret_store::SecretStore;
pub use tunnel::{TunnelController, TunnelStatus};
