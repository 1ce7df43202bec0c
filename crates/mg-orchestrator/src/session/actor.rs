//! The session task and its handle

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use mg_core::bridge::SecretBridge;
use mg_core::error::{BackendError, SessionError, TunnelError};
use mg_core::traits::{BackendClient, TunnelController, TunnelStatus};
use mg_core::types::{Device, DeviceId, ExitNodeSelection, NetworkId};
use mg_protocol::{RunnerStatus, TunnelConfig};

use super::state::{DisconnectOutcome, Session, SessionSnapshot, SessionStatus};
use crate::observer;

/// Services the orchestrator drives
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn BackendClient>,
    pub bridge: SecretBridge,
    pub tunnel: Arc<dyn TunnelController>,
}

type ConnectReply = oneshot::Sender<Result<(), SessionError>>;

/// Messages consumed by the session task
pub(crate) enum Command {
    Connect {
        network: NetworkId,
        exit_node: ExitNodeSelection,
        reply: ConnectReply,
    },
    Disconnect {
        reply: oneshot::Sender<DisconnectOutcome>,
    },
    Tunnel(TunnelStatus),
}

/// Result of the one collaborator call in flight
enum StepOutcome {
    Registered(Result<Device, BackendError>),
    ExitNodeAssigned(Result<(), BackendError>),
    ConfigFetched(Result<TunnelConfig, SessionError>),
    Published(Result<(), SessionError>),
    EngineSignalled(Result<(), TunnelError>),
    CleanedUp,
}

/// What to do after a step completed
enum Next {
    AssignExitNode,
    FetchConfig(DeviceId),
    Publish(TunnelConfig),
    StartEngine,
    Signalled,
    Fail(SessionError),
}

struct DeferredConnect {
    network: NetworkId,
    exit_node: ExitNodeSelection,
    reply: ConnectReply,
}

struct SessionTask {
    session: Session,
    collaborators: Collaborators,
    device_name: String,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    /// At most one collaborator call runs at a time
    in_flight: Option<BoxFuture<'static, StepOutcome>>,
    connect_reply: Option<ConnectReply>,
    /// Disconnect requested while a step was in flight
    pending_disconnect: bool,
    /// Connect requested while disconnect cleanup was still running
    deferred_connect: Option<DeferredConnect>,
    /// Tunnel went down on its own while a step was in flight
    pending_cleanup: bool,
}

/// Start the session task.
///
/// The task runs until every [`OrchestratorHandle`] has been dropped.
pub fn spawn(
    collaborators: Collaborators,
    device_name: impl Into<String>,
    channel_capacity: usize,
) -> (OrchestratorHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(channel_capacity.max(1));
    let (snapshots_tx, snapshots_rx) = watch::channel(SessionSnapshot::default());

    observer::spawn_forwarder(collaborators.tunnel.subscribe(), commands_tx.downgrade());

    let handle = OrchestratorHandle {
        commands: commands_tx,
        snapshots: snapshots_rx,
        tunnel: Arc::clone(&collaborators.tunnel),
    };

    let task = SessionTask {
        session: Session::default(),
        collaborators,
        device_name: device_name.into(),
        commands: commands_rx,
        snapshots: snapshots_tx,
        in_flight: None,
        connect_reply: None,
        pending_disconnect: false,
        deferred_connect: None,
        pending_cleanup: false,
    };

    (handle, tokio::spawn(task.run()))
}

async fn next_outcome(slot: &mut Option<BoxFuture<'static, StepOutcome>>) -> StepOutcome {
    match slot.as_mut() {
        Some(step) => {
            let outcome = step.await;
            *slot = None;
            outcome
        }
        None => std::future::pending().await,
    }
}

impl SessionTask {
    async fn run(mut self) {
        tracing::info!("Session task started for device '{}'", self.device_name);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                outcome = next_outcome(&mut self.in_flight) => self.handle_outcome(outcome),
            }
            self.publish();
        }

        self.drain().await;
        tracing::info!("Session task stopped");
    }

    /// Every handle is gone. Finish the step in flight so cleanup is never cut short;
    /// an unfinished connect is cancelled and torn down.
    async fn drain(&mut self) {
        if let Some(deferred) = self.deferred_connect.take() {
            let _ = deferred.reply.send(Err(SessionError::Shutdown));
        }
        if self.connect_reply.is_some() {
            self.pending_disconnect = true;
        }

        while let Some(step) = self.in_flight.take() {
            let outcome = step.await;
            self.handle_outcome(outcome);
            self.publish();
        }
    }

    fn publish(&self) {
        let next = self.session.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Answer a caller only after the snapshot reflects the new state
    fn reply<T>(&self, tx: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = tx.send(value);
    }

    fn transition(&mut self, status: SessionStatus) {
        tracing::info!("Session {} -> {}", self.session.status, status);
        self.session.status = status;
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                network,
                exit_node,
                reply,
            } => self.handle_connect(network, exit_node, reply),
            Command::Disconnect { reply } => {
                let outcome = self.handle_disconnect();
                self.reply(reply, outcome);
            }
            Command::Tunnel(status) => {
                let before = self.session.status.clone();
                observer::fold(&mut self.session, status);

                // Disconnecting already runs its own cleanup
                let dropped = matches!(before, SessionStatus::StartingEngine | SessionStatus::Connected)
                    && self.session.status == SessionStatus::Disconnected;
                if dropped {
                    self.cleanup_after_drop();
                }
            }
        }
    }

    /// The tunnel stopped without a disconnect: release the exit node and the bridge
    fn cleanup_after_drop(&mut self) {
        if self.in_flight.is_some() {
            self.pending_cleanup = true;
        } else {
            tracing::info!("Tunnel dropped, cleaning up");
            self.launch_cleanup(false);
        }
    }

    fn handle_connect(&mut self, network: NetworkId, exit_node: ExitNodeSelection, reply: ConnectReply) {
        if !self.session.status.accepts_connect() || self.deferred_connect.is_some() {
            tracing::debug!("Rejecting connect while {}", self.session.status);
            self.reply(reply, Err(SessionError::AlreadyInProgress));
            return;
        }

        if self.in_flight.is_some() {
            tracing::debug!("Deferring connect until disconnect cleanup finishes");
            self.deferred_connect = Some(DeferredConnect {
                network,
                exit_node,
                reply,
            });
            return;
        }

        self.begin_connect(network, exit_node, reply);
    }

    fn begin_connect(&mut self, network: NetworkId, exit_node: ExitNodeSelection, reply: ConnectReply) {
        tracing::info!("Connecting to network {} via exit {}", network, exit_node);

        self.session.network = Some(network.clone());
        self.session.exit_node = exit_node;
        self.session.last_error = None;
        self.session.clear_connection();
        self.connect_reply = Some(reply);
        self.pending_disconnect = false;

        self.transition(SessionStatus::Registering);
        let backend = Arc::clone(&self.collaborators.backend);
        let device_name = self.device_name.clone();
        self.in_flight = Some(
            async move { StepOutcome::Registered(backend.register_device(&network, &device_name).await) }
                .boxed(),
        );
    }

    fn handle_disconnect(&mut self) -> DisconnectOutcome {
        match self.session.status {
            SessionStatus::Disconnected => match self.deferred_connect.take() {
                Some(deferred) => {
                    self.reply(deferred.reply, Err(SessionError::Cancelled));
                    DisconnectOutcome::Disconnected
                }
                None => DisconnectOutcome::AlreadyDisconnected,
            },
            SessionStatus::Disconnecting => DisconnectOutcome::Disconnecting,
            _ if self.in_flight.is_some() => {
                tracing::info!("Disconnect queued while {}", self.session.status);
                self.pending_disconnect = true;
                DisconnectOutcome::Queued
            }
            SessionStatus::Failed(_) => {
                self.disconnect_without_tunnel();
                DisconnectOutcome::Disconnected
            }
            _ => {
                self.begin_disconnect();
                DisconnectOutcome::Disconnecting
            }
        }
    }

    /// Tear down a started tunnel; completion arrives as a tunnel notification
    fn begin_disconnect(&mut self) {
        self.transition(SessionStatus::Disconnecting);
        self.launch_cleanup(true);
    }

    /// Tear down a session whose tunnel never came up
    fn disconnect_without_tunnel(&mut self) {
        let stop_tunnel = self.session.status.is_failed();
        self.launch_cleanup(stop_tunnel);
        self.transition(SessionStatus::Disconnected);
        self.session.clear_connection();
    }

    fn launch_cleanup(&mut self, stop_tunnel: bool) {
        self.pending_cleanup = false;
        let Collaborators {
            backend,
            bridge,
            tunnel,
        } = self.collaborators.clone();
        let network = self.session.network.clone();

        self.in_flight = Some(
            async move {
                if stop_tunnel {
                    if let Err(e) = tunnel.stop().await {
                        tracing::warn!("Failed to stop tunnel: {}", e);
                    }
                }

                if let Some(network) = network {
                    if let Err(e) = backend.set_exit_node(&network, &ExitNodeSelection::None).await {
                        tracing::warn!("Failed to clear exit node on {}: {}", network, e);
                    }
                }

                if let Err(e) = tokio::task::spawn_blocking(move || bridge.clear()).await {
                    tracing::warn!("Bridge cleanup task failed: {}", e);
                }

                StepOutcome::CleanedUp
            }
            .boxed(),
        );
    }

    fn handle_outcome(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::CleanedUp => tracing::debug!("Disconnect cleanup finished"),
            step => self.advance(step),
        }

        if self.in_flight.is_none() && std::mem::take(&mut self.pending_cleanup) {
            tracing::info!("Tunnel dropped during start, cleaning up");
            self.launch_cleanup(false);
        }

        if self.in_flight.is_none() {
            if let Some(deferred) = self.deferred_connect.take() {
                if self.session.status.accepts_connect() {
                    self.begin_connect(deferred.network, deferred.exit_node, deferred.reply);
                } else {
                    self.reply(deferred.reply, Err(SessionError::AlreadyInProgress));
                }
            }
        }
    }

    fn advance(&mut self, outcome: StepOutcome) {
        let next = match outcome {
            StepOutcome::Registered(Ok(device)) => {
                tracing::info!("Registered as device {} ({})", device.name, device.ip_address);
                self.session.device = Some(device);
                Next::AssignExitNode
            }
            StepOutcome::Registered(Err(e)) => Next::Fail(SessionError::Network(e.message().to_string())),
            StepOutcome::ExitNodeAssigned(Ok(())) => match &self.session.device {
                Some(device) => Next::FetchConfig(device.id.clone()),
                None => Next::Fail(SessionError::Network("no registered device".to_string())),
            },
            StepOutcome::ExitNodeAssigned(Err(e)) => {
                Next::Fail(SessionError::PartialFailure(e.message().to_string()))
            }
            StepOutcome::ConfigFetched(Ok(config)) => Next::Publish(config),
            StepOutcome::ConfigFetched(Err(e)) => Next::Fail(e),
            StepOutcome::Published(Ok(())) => Next::StartEngine,
            StepOutcome::Published(Err(e)) => Next::Fail(e),
            StepOutcome::EngineSignalled(Ok(())) => Next::Signalled,
            StepOutcome::EngineSignalled(Err(e)) => Next::Fail(e.into()),
            StepOutcome::CleanedUp => return,
        };

        let disconnect_requested = std::mem::take(&mut self.pending_disconnect);

        match next {
            Next::Fail(err) => {
                self.fail(err);
                if disconnect_requested {
                    self.disconnect_without_tunnel();
                }
            }
            Next::Signalled => {
                self.complete_connect();
                if disconnect_requested && self.session.status.tunnel_requested() {
                    self.begin_disconnect();
                }
            }
            _ if disconnect_requested => {
                tracing::info!("Connect cancelled by queued disconnect");
                self.disconnect_without_tunnel();
                if let Some(reply) = self.connect_reply.take() {
                    self.reply(reply, Err(SessionError::Cancelled));
                }
            }
            step => self.launch(step),
        }
    }

    fn launch(&mut self, next: Next) {
        let Collaborators {
            backend,
            bridge,
            tunnel,
        } = self.collaborators.clone();

        let (status, step) = match next {
            Next::AssignExitNode => {
                let network = self.session.network.clone().unwrap_or_default();
                let exit_node = self.session.exit_node.clone();
                let step = async move {
                    StepOutcome::ExitNodeAssigned(backend.set_exit_node(&network, &exit_node).await)
                }
                .boxed();
                (SessionStatus::AssigningExitNode, step)
            }
            Next::FetchConfig(device) => {
                let step = async move {
                    let result = match backend.get_device_config(&device).await {
                        Ok(text) => TunnelConfig::parse(&text)
                            .map_err(|e| SessionError::InvalidConfiguration(e.to_string())),
                        Err(e) => Err(SessionError::Network(e.message().to_string())),
                    };
                    StepOutcome::ConfigFetched(result)
                }
                .boxed();
                (SessionStatus::FetchingConfig, step)
            }
            Next::Publish(config) => {
                let step = async move {
                    let result = match tokio::task::spawn_blocking(move || bridge.publish(&config)).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(SessionError::Configuration(e.to_string())),
                        Err(e) => Err(SessionError::Configuration(e.to_string())),
                    };
                    StepOutcome::Published(result)
                }
                .boxed();
                (SessionStatus::Publishing, step)
            }
            Next::StartEngine => {
                let step = async move {
                    let result = tunnel.start().await;
                    if result.is_err() {
                        // Nothing will read the published entry now
                        let _ = tokio::task::spawn_blocking(move || bridge.clear()).await;
                    }
                    StepOutcome::EngineSignalled(result)
                }
                .boxed();
                (SessionStatus::StartingEngine, step)
            }
            Next::Signalled | Next::Fail(_) => return,
        };

        self.transition(status);
        self.in_flight = Some(step);
    }

    /// Start was signalled; the tunnel notification decides the rest
    fn complete_connect(&mut self) {
        let result = match &self.session.status {
            SessionStatus::StartingEngine | SessionStatus::Connected => Ok(()),
            // The tunnel already reported it stopped
            _ => Err(self
                .session
                .last_error
                .clone()
                .unwrap_or_else(|| SessionError::Engine(observer::STOPPED_BEFORE_ACTIVE.to_string()))),
        };

        if let Some(reply) = self.connect_reply.take() {
            self.reply(reply, result);
        }
    }

    fn fail(&mut self, err: SessionError) {
        tracing::error!("Connect failed: {}", err);
        self.session.last_error = Some(err.clone());
        self.transition(SessionStatus::Failed(err.clone()));

        if let Some(reply) = self.connect_reply.take() {
            self.reply(reply, Err(err));
        }
    }
}

/// Cloneable handle to the session task
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    tunnel: Arc<dyn TunnelController>,
}

impl OrchestratorHandle {
    /// Run registration, exit-node assignment, configuration fetch, bridge publish
    /// and tunnel start.
    ///
    /// Resolves once the tunnel start has been signalled or a step failed. Whether
    /// the tunnel actually came up shows in [`snapshot`](Self::snapshot).
    pub async fn connect(
        &self,
        network: NetworkId,
        exit_node: ExitNodeSelection,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect {
                network,
                exit_node,
                reply,
            })
            .await
            .map_err(|_| SessionError::Shutdown)?;

        rx.await.map_err(|_| SessionError::Shutdown)?
    }

    /// Stop the tunnel and clean up. Never fails because of cleanup problems.
    pub async fn disconnect(&self) -> Result<DisconnectOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Disconnect { reply })
            .await
            .map_err(|_| SessionError::Shutdown)?;

        rx.await.map_err(|_| SessionError::Shutdown)
    }

    /// Current state of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receive every change to the session
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the session satisfies `predicate`
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::Shutdown)?;
        Ok(snapshot.clone())
    }

    /// Ask the tunnel runner directly whether it holds a running engine
    pub async fn probe(&self) -> Result<RunnerStatus, TunnelError> {
        self.tunnel.probe().await
    }
}
