//! Tunnel controller backed by a separate `mg-runner` process
//!
//! Stands in for the operating system's tunnel-management facility on desktop
//! platforms. Each `start` launches a fresh runner with a fresh control token and
//! reports progress through the same six-way status stream the OS would use:
//!
//! - `connecting` once the runner process is spawned
//! - `connected` once the runner answered `Start` successfully
//! - `invalid` when the runner rejected the bridged configuration
//! - `disconnecting` when `stop` is called
//! - `disconnected` whenever the runner process exits

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot, Mutex};

use mg_core::config::{BridgeBackend, ClientConfig};
use mg_core::control_auth;
use mg_core::error::TunnelError;
use mg_core::traits::{TunnelController, TunnelStatus};
use mg_protocol::RunnerStatus;

use super::control_client::ControlClient;

const RUNNER_BIN: &str = "mg-runner";

/// A launched runner
struct RunnerSlot {
    generation: u64,
    token: String,
    /// Authenticated connection, present once `Start` succeeded
    client: Option<ControlClient>,
    kill: Option<oneshot::Sender<()>>,
}

struct Shared {
    slot: Mutex<Option<RunnerSlot>>,
    events: broadcast::Sender<TunnelStatus>,
}

impl Shared {
    fn emit(&self, status: TunnelStatus) {
        tracing::debug!("Runner status: {}", status);
        // No subscribers is fine
        let _ = self.events.send(status);
    }

    /// Ask the supervisor of `generation` to kill its runner
    async fn kill(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        if let Some(runner) = slot.as_mut().filter(|r| r.generation == generation) {
            if let Some(kill) = runner.kill.take() {
                let _ = kill.send(());
            }
        }
    }
}

/// Launches and drives `mg-runner` over its localhost control socket
pub struct ProcessTunnelController {
    runner_path: PathBuf,
    state_dir: PathBuf,
    control_port: u16,
    bridge: BridgeBackend,
    start_timeout: Duration,
    shared: Arc<Shared>,
    next_generation: std::sync::atomic::AtomicU64,
}

impl ProcessTunnelController {
    pub fn new(
        runner_path: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        control_port: u16,
        bridge: BridgeBackend,
        start_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            runner_path: runner_path.into(),
            state_dir: state_dir.into(),
            control_port,
            bridge,
            start_timeout,
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                events,
            }),
            next_generation: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let runner_path = config
            .runner_path
            .clone()
            .unwrap_or_else(default_runner_path);

        Self::new(
            runner_path,
            config.state_dir.clone(),
            config.control_port,
            config.bridge,
            config.start_timeout,
        )
    }

    fn control_address(&self) -> String {
        format!("127.0.0.1:{}", self.control_port)
    }

    fn spawn_runner(&self) -> Result<Child, TunnelError> {
        tracing::info!("Launching {}", self.runner_path.display());

        Command::new(&self.runner_path)
            .arg("--control-port")
            .arg(self.control_port.to_string())
            .arg("--state-dir")
            .arg(&self.state_dir)
            .arg("--bridge")
            .arg(self.bridge.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TunnelError::Unavailable(format!(
                    "failed to launch {}: {}",
                    self.runner_path.display(),
                    e
                ))
            })
    }
}

/// `mg-runner` next to the current executable, else whatever is on `PATH`
pub fn default_runner_path() -> PathBuf {
    let name = format!("{}{}", RUNNER_BIN, std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Wait for the runner to exit (or be killed), then report it down
async fn supervise(mut child: Child, kill: oneshot::Receiver<()>, generation: u64, shared: Arc<Shared>) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => tracing::info!("Tunnel runner exited with {}", status),
            Err(e) => tracing::warn!("Failed to wait for tunnel runner: {}", e),
        },
        _ = kill => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill tunnel runner: {}", e);
            }
            tracing::info!("Tunnel runner terminated");
        }
    }

    let superseded = {
        let mut slot = shared.slot.lock().await;
        match slot.as_ref().map(|r| r.generation) {
            Some(current) if current == generation => {
                *slot = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    };

    // A replaced runner must not report over its successor
    if !superseded {
        shared.emit(TunnelStatus::Disconnected);
    }
}

/// Connect to the new runner and ask it to start the engine
async fn handshake(address: String, token: String, window: Duration, generation: u64, shared: Arc<Shared>) {
    let result = async {
        let mut client = ControlClient::connect_with_retry(&address, &token, window).await?;
        client.start().await?;
        Ok::<_, TunnelError>(client)
    }
    .await;

    match result {
        Ok(client) => {
            let mut slot = shared.slot.lock().await;
            match slot.as_mut().filter(|r| r.generation == generation) {
                Some(runner) => {
                    runner.client = Some(client);
                    drop(slot);
                    tracing::info!("Tunnel runner started the engine");
                    shared.emit(TunnelStatus::Connected);
                }
                None => tracing::debug!("Runner went away before start completed"),
            }
        }
        Err(e) => {
            tracing::error!("Tunnel runner failed to start: {}", e);
            if matches!(
                e,
                TunnelError::Configuration(_) | TunnelError::InvalidConfiguration(_)
            ) {
                shared.emit(TunnelStatus::Invalid);
            }
            shared.kill(generation).await;
        }
    }
}

#[async_trait]
impl TunnelController for ProcessTunnelController {
    async fn start(&self) -> Result<(), TunnelError> {
        // Replace any runner left from an earlier session
        if let Some(previous) = self.shared.slot.lock().await.take() {
            tracing::warn!("Replacing running tunnel runner");
            if let Some(kill) = previous.kill {
                let _ = kill.send(());
            }
        }

        let token = control_auth::issue_token(&self.state_dir)
            .map_err(|e| TunnelError::Unavailable(format!("failed to write control token: {}", e)))?;
        let child = self.spawn_runner()?;

        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let (kill_tx, kill_rx) = oneshot::channel();

        *self.shared.slot.lock().await = Some(RunnerSlot {
            generation,
            token: token.clone(),
            client: None,
            kill: Some(kill_tx),
        });

        self.shared.emit(TunnelStatus::Connecting);

        tokio::spawn(supervise(child, kill_rx, generation, Arc::clone(&self.shared)));
        tokio::spawn(handshake(
            self.control_address(),
            token,
            self.start_timeout,
            generation,
            Arc::clone(&self.shared),
        ));

        Ok(())
    }

    async fn stop(&self) -> Result<(), TunnelError> {
        let runner = self.shared.slot.lock().await.take();

        let Some(mut runner) = runner else {
            // Nothing running; make sure observers settle
            self.shared.emit(TunnelStatus::Disconnected);
            return Ok(());
        };

        self.shared.emit(TunnelStatus::Disconnecting);

        if let Some(client) = runner.client.as_mut() {
            if let Err(e) = client.stop().await {
                tracing::warn!("Runner did not acknowledge stop: {}", e);
            }
        }

        if let Some(kill) = runner.kill.take() {
            let _ = kill.send(());
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TunnelStatus> {
        self.shared.events.subscribe()
    }

    async fn probe(&self) -> Result<RunnerStatus, TunnelError> {
        let token = match self.shared.slot.lock().await.as_ref() {
            Some(runner) => runner.token.clone(),
            None => return Ok(RunnerStatus::Disconnected),
        };

        let mut client = ControlClient::connect(&self.control_address(), &token).await?;
        client.status().await
    }
}

impl std::fmt::Debug for ProcessTunnelController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTunnelController")
            .field("runner_path", &self.runner_path)
            .field("state_dir", &self.state_dir)
            .field("control_port", &self.control_port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_runner_binary() {
        let dir = tempdir().unwrap();
        let controller = ProcessTunnelController::new(
            dir.path().join("no-such-runner"),
            dir.path(),
            0,
            BridgeBackend::File,
            Duration::from_millis(100),
        );
        let mut events = controller.subscribe();

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, TunnelError::Unavailable(_)));
        assert!(events.try_recv().is_err(), "no status emitted when nothing was launched");
    }

    #[tokio::test]
    async fn test_stop_without_runner_reports_disconnected() {
        let dir = tempdir().unwrap();
        let controller = ProcessTunnelController::new(
            dir.path().join("mg-runner"),
            dir.path(),
            0,
            BridgeBackend::File,
            Duration::from_millis(100),
        );
        let mut events = controller.subscribe();

        controller.stop().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), TunnelStatus::Disconnected);
        assert_eq!(controller.probe().await.unwrap(), RunnerStatus::Disconnected);
    }
}
