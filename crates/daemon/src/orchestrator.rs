//! Daemon orchestrator for wiring together all components.
//!
//! This module provides the `DaemonOrchestrator` that initializes and
//! coordinates the daemon subsystems: the session manager, the transport
//! driver, and the IPC server that CLI clients talk to.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use transport::{CredentialStore, MemoryConnector, MemoryRemote, TransportEvent};

use crate::config::Config;
use crate::ipc::{
    get_socket_path, IpcConnection, IpcRequest, IpcResponse, IpcServer, SessionEvent,
};
use crate::session::{SessionManager, SessionSettings};

/// How long the loopback driver waits for a connect before re-arming.
const LOOPBACK_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up, initializing components.
    Starting,
    /// Running and accepting connections.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Daemon orchestrator that manages all subsystems.
pub struct DaemonOrchestrator {
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// The session manager owning the platform link.
    manager: SessionManager<MemoryConnector>,
    /// Control side of the loopback transport.
    remote: MemoryRemote,
    /// Where the IPC socket is bound.
    socket_path: PathBuf,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl DaemonOrchestrator {
    /// Creates a new daemon orchestrator.
    ///
    /// Builds the transport from `config.transport.mode`, opens the
    /// credential store directory, and constructs the session manager.
    /// Nothing connects until [`start`](Self::start).
    pub fn new(config: Config) -> Result<Self> {
        let (connector, remote) = match config.transport.mode.as_str() {
            "loopback" => MemoryConnector::pair(),
            other => anyhow::bail!("Unsupported transport mode: {}", other),
        };

        let store = CredentialStore::new(config.credentials_dir());
        let settings = SessionSettings {
            reconnect_delay: config.reconnect_delay(),
            logout_reinit_delay: config.logout_reinit_delay(),
            country_prefix: config.session.country_prefix.clone(),
        };
        let manager = SessionManager::new(connector, store, settings);

        Ok(Self {
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            manager,
            remote,
            socket_path: get_socket_path(),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Overrides the IPC socket path. Used by tests to avoid the shared
    /// per-user default.
    pub fn with_socket_path(mut self, path: PathBuf) -> Self {
        self.socket_path = path;
        self
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Returns the session manager.
    pub fn manager(&self) -> &SessionManager<MemoryConnector> {
        &self.manager
    }

    /// Returns the control side of the loopback transport.
    pub fn remote(&self) -> &MemoryRemote {
        &self.remote
    }

    /// Returns the path the IPC socket is bound to.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    ///
    /// The token fires when a client sends a Shutdown request or when
    /// [`stop`](Self::stop) runs.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Starts the daemon orchestrator.
    ///
    /// Binds the IPC socket, spawns the transport driver and the accept
    /// loop, and kicks off the first session initialization.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            *state = OrchestratorState::Starting;
        }

        info!("Starting daemon orchestrator...");

        let server = IpcServer::bind(&self.socket_path)
            .await
            .with_context(|| format!("Failed to bind IPC socket: {}", self.socket_path.display()))?;
        info!(socket = %self.socket_path.display(), "IPC server listening");

        let remote = self.remote.clone();
        let driver_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            run_loopback_driver(remote, driver_token).await;
        });
        debug!("Started loopback transport driver");

        let manager = self.manager.clone();
        let accept_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            run_accept_loop(server, manager, accept_token).await;
        });

        self.manager.initialize().await;

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Running;
        }

        info!("Daemon orchestrator started successfully");
        Ok(())
    }

    /// Stops the daemon orchestrator gracefully.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }

        info!("Stopping daemon orchestrator...");

        // Stops the accept loop, open connections, and the driver.
        self.shutdown_token.cancel();

        self.manager.shutdown().await;

        let _ = std::fs::remove_file(&self.socket_path);

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Stopped;
        }

        info!("Daemon orchestrator stopped");
        Ok(())
    }
}

/// Drives the loopback transport: whenever the session manager opens a new
/// link, issue a pairing challenge on it.
///
/// The loopback has no platform behind it, so the session stays in the
/// connecting state showing a scannable challenge. Useful for exercising
/// the daemon end to end without credentials for the real service.
async fn run_loopback_driver(remote: MemoryRemote, shutdown: CancellationToken) {
    let mut served: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            arrived = remote.wait_for_connects(served + 1, LOOPBACK_POLL_INTERVAL) => {
                if !arrived {
                    continue;
                }
                served = remote.connect_count();

                let challenge = format!("IRIS-LOOP-{:08X}", rand::random::<u32>());
                debug!("loopback link up, issuing pairing challenge");
                if !remote.emit(TransportEvent::challenge(challenge)).await {
                    // Link went away between connect and emit; the next
                    // connect will get a fresh challenge.
                    continue;
                }
            }
        }
    }

    debug!("loopback driver finished");
}

/// Accepts IPC connections until shutdown, handling each on its own task.
async fn run_accept_loop(
    server: IpcServer,
    manager: SessionManager<MemoryConnector>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = server.accept() => {
                match accepted {
                    Ok(conn) => {
                        let manager = manager.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            handle_connection(conn, manager, shutdown).await;
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept IPC connection: {}", e);
                    }
                }
            }
        }
    }

    debug!("IPC accept loop finished");
}

/// Serves one IPC connection: request-response until the client
/// disconnects, subscribes, or asks for shutdown.
async fn handle_connection(
    mut conn: IpcConnection,
    manager: SessionManager<MemoryConnector>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            request = conn.read_request() => match request {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e) => {
                    debug!("Dropping IPC connection: {}", e);
                    break;
                }
            },
        };

        let response = match request {
            IpcRequest::Ping => IpcResponse::Pong,
            IpcRequest::GetStatus => IpcResponse::Status(manager.snapshot().await),
            IpcRequest::GetPairingChallenge => IpcResponse::PairingChallenge {
                challenge: manager.pairing_challenge().await,
            },
            IpcRequest::GetIdentity => IpcResponse::Identity {
                identity: manager.identity().await,
            },
            IpcRequest::Initialize => {
                manager.initialize().await;
                IpcResponse::Ok
            }
            IpcRequest::Send {
                target,
                text,
                attachment,
            } => match manager
                .send(&target, text.as_deref(), attachment.as_ref())
                .await
            {
                Ok(()) => IpcResponse::Ok,
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            },
            IpcRequest::Logout => match manager.logout().await {
                Ok(()) => IpcResponse::Ok,
                Err(e) => IpcResponse::Error {
                    message: format!("credential wipe failed: {}", e),
                },
            },
            IpcRequest::Subscribe => {
                if conn.send_response(&IpcResponse::Ok).await.is_err() {
                    break;
                }
                stream_events(&mut conn, &manager, &shutdown).await;
                break;
            }
            IpcRequest::Shutdown => {
                if let Err(e) = conn.send_response(&IpcResponse::Ok).await {
                    debug!("Failed to acknowledge shutdown request: {}", e);
                }
                info!("Shutdown requested over IPC");
                shutdown.cancel();
                break;
            }
        };

        if let Err(e) = conn.send_response(&response).await {
            debug!("Failed to send IPC response: {}", e);
            break;
        }
    }
}

/// Streams session events to a subscribed connection.
///
/// Starts by replaying the current snapshot so the client renders without
/// waiting for the next transition, then forwards both broadcast streams
/// until the client drops or the daemon shuts down.
async fn stream_events(
    conn: &mut IpcConnection,
    manager: &SessionManager<MemoryConnector>,
    shutdown: &CancellationToken,
) {
    let mut status_rx = manager.subscribe_status();
    let mut pairing_rx = manager.subscribe_pairing();

    let snapshot = manager.snapshot().await;
    let primer = [
        IpcResponse::Event(SessionEvent::StatusChanged {
            status: snapshot.status,
        }),
        IpcResponse::Event(SessionEvent::PairingUpdated {
            challenge: snapshot.pairing_challenge,
        }),
    ];
    for frame in &primer {
        if conn.send_response(frame).await.is_err() {
            return;
        }
    }

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            status = status_rx.recv() => match status {
                Ok(status) => SessionEvent::StatusChanged { status },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged, continuing");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            pairing = pairing_rx.recv() => match pairing {
                Ok(challenge) => SessionEvent::PairingUpdated { challenge },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged, continuing");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if conn
            .send_response(&IpcResponse::Event(event))
            .await
            .is_err()
        {
            debug!("Event subscriber disconnected");
            break;
        }
    }
}
