//! Session manager: owner of the platform link lifecycle.
//!
//! One manager exists per daemon. It opens the transport link from stored
//! credentials, follows the link's event stream through pairing and open,
//! folds every failure into a closed state with an automatic delayed
//! re-initialization, and mediates outbound sends. Callers observe the
//! session through snapshot accessors and two broadcast streams, one for
//! status transitions and one for pairing-challenge updates.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use transport::{
    ConnectionSignal, CredentialStore, TransportConnector, TransportEvent, TransportHandle,
    CLOSE_CAUSE_SESSION_REVOKED,
};

use super::identity::extract_identity;
use super::send::{build_payload, normalize_target, Attachment, SendError};

/// Capacity of the status and pairing broadcast channels.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connection status of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No initialization has run yet.
    Uninitialized,
    /// A link is being opened or is waiting for pairing.
    Connecting,
    /// The link is authenticated and usable.
    Open,
    /// The link went away; a re-initialization is pending.
    Closed,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of the session fields.
///
/// The three fields are read and written under one lock, so a snapshot is
/// always internally consistent: a pairing challenge and an identity are
/// never both present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub pairing_challenge: Option<String>,
    pub identity: Option<String>,
}

/// Tunables for the session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Delay before re-initializing after a close.
    pub reconnect_delay: Duration,
    /// Delay before re-initializing after a logout.
    pub logout_reinit_delay: Duration,
    /// Country prefix stripped from the paired identity. Empty disables
    /// stripping.
    pub country_prefix: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(3000),
            logout_reinit_delay: Duration::from_millis(1000),
            country_prefix: "55".to_string(),
        }
    }
}

struct Shared<C: TransportConnector> {
    connector: C,
    store: CredentialStore,
    settings: SessionSettings,
    state: RwLock<SessionSnapshot>,
    handle: RwLock<Option<Arc<C::Handle>>>,
    init_in_flight: AtomicBool,
    /// Monotonic id claimed by each connect attempt, bumped again on logout
    /// and shutdown. An attempt whose id is no longer the newest when its
    /// connect() resolves discards the link instead of installing it.
    attempts: AtomicU64,
    /// Attempt id of the live link; 0 when none. Event handlers compare
    /// against this so a superseded link is silently outlived rather than
    /// torn down twice.
    live_generation: AtomicU64,
    status_tx: broadcast::Sender<SessionStatus>,
    pairing_tx: broadcast::Sender<Option<String>>,
    shutdown: CancellationToken,
}

/// The session manager. Cheap to clone; all clones share one session.
pub struct SessionManager<C: TransportConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: TransportConnector> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: TransportConnector> SessionManager<C> {
    /// Create a manager over the given connector and credential store.
    ///
    /// Nothing connects until [`initialize`](Self::initialize) is called.
    pub fn new(connector: C, store: CredentialStore, settings: SessionSettings) -> Self {
        let (status_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (pairing_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                connector,
                store,
                settings,
                state: RwLock::new(SessionSnapshot::default()),
                handle: RwLock::new(None),
                init_in_flight: AtomicBool::new(false),
                attempts: AtomicU64::new(0),
                live_generation: AtomicU64::new(0),
                status_tx,
                pairing_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Current status.
    pub async fn status(&self) -> SessionStatus {
        self.shared.state.read().await.status
    }

    /// Current unconsumed pairing challenge, if any.
    pub async fn pairing_challenge(&self) -> Option<String> {
        self.shared.state.read().await.pairing_challenge.clone()
    }

    /// Normalized identity of the paired subscriber, if the session is open
    /// and extraction succeeded.
    pub async fn identity(&self) -> Option<String> {
        self.shared.state.read().await.identity.clone()
    }

    /// Consistent snapshot of status, challenge, and identity.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.read().await.clone()
    }

    /// Whether an initialization attempt is currently pending.
    pub fn initialization_in_flight(&self) -> bool {
        self.shared.init_in_flight.load(Ordering::SeqCst)
    }

    /// Subscribe to status transitions.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Subscribe to pairing-challenge updates. `None` means the current
    /// challenge was invalidated.
    pub fn subscribe_pairing(&self) -> broadcast::Receiver<Option<String>> {
        self.shared.pairing_tx.subscribe()
    }

    /// Start an initialization attempt.
    ///
    /// A no-op while another attempt is pending. A fresh attempt supersedes
    /// any live link: the old handle is ended and its remaining events are
    /// dropped. An attempt overtaken while connecting, by a logout or a
    /// shutdown, ends its own link instead of installing it. Failures to
    /// load credentials or open the link are folded into the closed state,
    /// which schedules the next attempt.
    pub async fn initialize(&self) {
        let shared = &self.shared;

        if shared
            .init_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("initialization already in flight, ignoring");
            return;
        }

        // Supersede any live link before opening a new one. At most one
        // live handle exists at any time.
        shared.live_generation.store(0, Ordering::SeqCst);
        let previous = shared.handle.write().await.take();
        if let Some(previous) = previous {
            debug!("ending superseded link");
            previous.end().await;
        }

        {
            let mut state = shared.state.write().await;
            state.status = SessionStatus::Connecting;
            state.pairing_challenge = None;
            state.identity = None;
        }
        info!("initializing session");

        // Claimed before the credential load: logout bumps the counter only
        // after its wipe, so an attempt that is still the newest at install
        // time connected with post-wipe material.
        let generation = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let auth = match shared.store.load_or_create() {
            Ok(auth) => auth,
            Err(e) => {
                error!("failed to load credentials: {}", e);
                self.transition_closed(None).await;
                return;
            }
        };

        let (handle, events) = match shared.connector.connect(auth).await {
            Ok(link) => link,
            Err(e) => {
                if shared.attempts.load(Ordering::SeqCst) != generation {
                    debug!(generation, "superseded attempt failed to connect: {}", e);
                    return;
                }
                error!("failed to open transport link: {}", e);
                self.transition_closed(None).await;
                return;
            }
        };

        {
            let mut slot = shared.handle.write().await;
            // A logout or shutdown may have overtaken this attempt while
            // connect() was pending; its link must not be installed over a
            // newer one.
            if shared.attempts.load(Ordering::SeqCst) != generation {
                drop(slot);
                debug!(generation, "superseded attempt connected late, ending link");
                handle.end().await;
                return;
            }
            *slot = Some(Arc::new(handle));
            shared.live_generation.store(generation, Ordering::SeqCst);
        }
        debug!(generation, "transport link opened, listening for events");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_event_loop(generation, events).await;
        });
    }

    /// Dispatch one outbound message.
    ///
    /// Checks run in a fixed order: connection state, then target, then
    /// payload. The link is not touched unless the session is open. Failed
    /// sends are reported, never retried.
    pub async fn send(
        &self,
        target: &str,
        text: Option<&str>,
        attachment: Option<&Attachment>,
    ) -> Result<(), SendError> {
        let shared = &self.shared;

        if shared.state.read().await.status != SessionStatus::Open {
            return Err(SendError::NotConnected);
        }

        let target = normalize_target(target)?;
        let payload = build_payload(text, attachment)?;

        let handle = shared.handle.read().await.clone();
        let Some(handle) = handle else {
            return Err(SendError::NotConnected);
        };

        debug!(target = %target, kind = payload.kind(), "dispatching message");
        handle.send(&target, payload).await.map_err(|e| {
            warn!("dispatch failed: {}", e);
            SendError::SendFailed(e.to_string())
        })
    }

    /// Log out of the platform.
    ///
    /// Wipes the credential store first, so the scheduled re-initialization
    /// can only ever produce a fresh pairing, then ends the link, clears
    /// the session fields, and reports the close on both streams.
    pub async fn logout(&self) -> Result<(), transport::TransportError> {
        let shared = &self.shared;
        info!("logging out");

        let wipe_result = shared.store.wipe();
        if let Err(ref e) = wipe_result {
            // Teardown still proceeds; the session must not stay open on
            // material the user asked to discard.
            error!("failed to wipe credential store: {}", e);
        }

        // Overtake any connect attempt still parked in connect(); it loaded
        // pre-wipe credentials and must not install its link.
        shared.attempts.fetch_add(1, Ordering::SeqCst);
        shared.live_generation.store(0, Ordering::SeqCst);
        let handle = shared.handle.write().await.take();
        if let Some(handle) = handle {
            handle.end().await;
        }

        {
            let mut state = shared.state.write().await;
            state.status = SessionStatus::Closed;
            state.pairing_challenge = None;
            state.identity = None;
        }
        shared.init_in_flight.store(false, Ordering::SeqCst);

        let _ = shared.status_tx.send(SessionStatus::Closed);
        let _ = shared.pairing_tx.send(None);

        self.schedule_reinit(shared.settings.logout_reinit_delay);

        wipe_result
    }

    /// Tear the session down for daemon exit.
    ///
    /// Ends the link and cancels event loops and pending re-inits. Emits
    /// nothing; subscribers are going away with the process.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        info!("shutting down session");

        shared.shutdown.cancel();
        // Overtake any connect attempt still in flight.
        shared.attempts.fetch_add(1, Ordering::SeqCst);
        shared.live_generation.store(0, Ordering::SeqCst);
        if let Some(handle) = shared.handle.write().await.take() {
            handle.end().await;
        }
    }

    async fn run_event_loop(self, generation: u64, mut events: mpsc::Receiver<TransportEvent>) {
        let shutdown = self.shared.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        if self.handle_event(generation, event).await {
                            break;
                        }
                    }
                    None => {
                        // Stream ended without a close frame. Same thing.
                        self.handle_close(generation, None).await;
                        break;
                    }
                },
            }
        }

        debug!(generation, "event loop finished");
    }

    /// Process one link event. Returns true when the link is done.
    async fn handle_event(&self, generation: u64, event: TransportEvent) -> bool {
        if self.shared.live_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "dropping event from superseded link");
            return true;
        }

        if let Some(challenge) = event.pairing_challenge {
            self.handle_pairing_challenge(challenge).await;
        }

        match event.signal {
            Some(ConnectionSignal::Open) => {
                self.handle_open(generation).await;
                false
            }
            Some(ConnectionSignal::Close { cause }) => {
                self.handle_close(generation, cause).await;
                true
            }
            Some(ConnectionSignal::Connecting) | None => false,
        }
    }

    async fn handle_pairing_challenge(&self, challenge: String) {
        let mut state = self.shared.state.write().await;
        if state.status != SessionStatus::Connecting {
            warn!(status = %state.status, "ignoring pairing challenge outside of connecting");
            return;
        }
        // A fresh challenge supersedes the cached one.
        state.pairing_challenge = Some(challenge.clone());
        drop(state);

        info!("pairing challenge received");
        let _ = self.shared.pairing_tx.send(Some(challenge));
    }

    async fn handle_open(&self, generation: u64) {
        let shared = &self.shared;

        // The raw identity comes from the handle; read it before taking
        // the state lock.
        let raw = shared
            .handle
            .read()
            .await
            .as_ref()
            .and_then(|handle| handle.identity());
        let identity = raw
            .as_deref()
            .and_then(|raw| extract_identity(raw, &shared.settings.country_prefix));

        {
            let mut state = shared.state.write().await;
            if shared.live_generation.load(Ordering::SeqCst) != generation {
                debug!(generation, "dropping open from superseded link");
                return;
            }
            state.status = SessionStatus::Open;
            state.pairing_challenge = None;
            state.identity = identity.clone();
        }
        shared.init_in_flight.store(false, Ordering::SeqCst);

        match identity {
            Some(identity) => info!(identity = %identity, "session open"),
            // Not an error: the session is usable without a cached identity.
            None => warn!("session open, could not derive identity from link"),
        }

        let _ = shared.status_tx.send(SessionStatus::Open);
    }

    async fn handle_close(&self, generation: u64, cause: Option<u32>) {
        if self.shared.live_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "dropping close from superseded link");
            return;
        }

        info!(cause = ?cause, "link closed");
        self.transition_closed(cause).await;
    }

    /// The uniform close transition: discard the link, wipe credentials if
    /// the platform revoked them, clear the session fields, report on both
    /// streams, and schedule the re-initialization.
    async fn transition_closed(&self, cause: Option<u32>) {
        let shared = &self.shared;

        shared.live_generation.store(0, Ordering::SeqCst);
        shared.handle.write().await.take();

        if cause == Some(CLOSE_CAUSE_SESSION_REVOKED) {
            warn!("platform revoked the session, wiping credentials before retry");
            if let Err(e) = shared.store.wipe() {
                error!("failed to wipe credential store: {}", e);
            }
        }

        {
            let mut state = shared.state.write().await;
            state.status = SessionStatus::Closed;
            state.pairing_challenge = None;
            state.identity = None;
        }
        shared.init_in_flight.store(false, Ordering::SeqCst);

        let _ = shared.status_tx.send(SessionStatus::Closed);
        let _ = shared.pairing_tx.send(None);

        self.schedule_reinit(shared.settings.reconnect_delay);
    }

    /// Schedule one delayed re-initialization.
    ///
    /// The timer is superseded rather than cancelled: when it fires, it
    /// only acts if the session is still closed. Shutdown cancels it.
    fn schedule_reinit(&self, delay: Duration) {
        info!(delay_ms = delay.as_millis() as u64, "scheduling re-initialization");

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = manager.shared.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if manager.status().await == SessionStatus::Closed {
                        manager.initialize().await;
                    } else {
                        debug!("skipping re-initialization, session no longer closed");
                    }
                }
            }
        });
    }
}
