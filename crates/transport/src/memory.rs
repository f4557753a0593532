//! In-process transport.
//!
//! [`MemoryConnector`] implements the link contract without any network: a
//! paired [`MemoryRemote`] plays the platform side, feeding events into the
//! link and observing what the session core sends. The daemon's loopback
//! mode runs on it, and most session tests drive it directly.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use crate::error::{Result, TransportError};
use crate::event::TransportEvent;
use crate::link::{TransportConnector, TransportHandle};
use crate::payload::OutboundPayload;
use crate::store::AuthState;

const EVENT_BUFFER: usize = 64;

/// One message dispatched through a memory link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: String,
    pub payload: OutboundPayload,
}

#[derive(Debug, Default)]
struct Shared {
    identity: Mutex<Option<String>>,
    sent: Mutex<Vec<SentMessage>>,
    auths: Mutex<Vec<AuthState>>,
    event_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    connects: AtomicU32,
    ends: AtomicU32,
    fail_next_connects: AtomicU32,
    fail_send: AtomicBool,
    hold_next_connect: AtomicBool,
    held_connects: AtomicU32,
    release: Notify,
    changed: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector half of the in-process transport.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    /// Create a connector together with the remote that controls it.
    pub fn pair() -> (Self, MemoryRemote) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: shared.clone(),
            },
            MemoryRemote { shared },
        )
    }
}

#[async_trait]
impl TransportConnector for MemoryConnector {
    type Handle = MemoryHandle;

    async fn connect(
        &self,
        auth: AuthState,
    ) -> Result<(Self::Handle, mpsc::Receiver<TransportEvent>)> {
        let shared = &self.shared;

        let remaining = shared.fail_next_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            shared
                .fail_next_connects
                .store(remaining - 1, Ordering::SeqCst);
            shared.changed.notify_waiters();
            return Err(TransportError::ConnectionFailed(
                "memory transport: connect refused".into(),
            ));
        }

        lock(&shared.auths).push(auth);

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        *lock(&shared.event_tx) = Some(tx.clone());

        shared.connects.fetch_add(1, Ordering::SeqCst);
        shared.changed.notify_waiters();

        // A held attempt registers its link, then parks until released.
        if shared.hold_next_connect.swap(false, Ordering::SeqCst) {
            shared.held_connects.fetch_add(1, Ordering::SeqCst);
            shared.changed.notify_waiters();
            shared.release.notified().await;
            shared.held_connects.fetch_sub(1, Ordering::SeqCst);
            shared.changed.notify_waiters();
        }

        Ok((
            MemoryHandle {
                shared: shared.clone(),
                tx,
            },
            rx,
        ))
    }
}

/// Handle half of the in-process transport.
#[derive(Debug)]
pub struct MemoryHandle {
    shared: Arc<Shared>,
    tx: mpsc::Sender<TransportEvent>,
}

#[async_trait]
impl TransportHandle for MemoryHandle {
    fn identity(&self) -> Option<String> {
        lock(&self.shared.identity).clone()
    }

    async fn send(&self, target: &str, payload: OutboundPayload) -> Result<()> {
        if self.shared.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::SendRejected(
                "memory transport: send refused".into(),
            ));
        }
        lock(&self.shared.sent).push(SentMessage {
            target: target.to_string(),
            payload,
        });
        self.shared.changed.notify_waiters();
        Ok(())
    }

    async fn end(&self) {
        // Dropping the sender terminates the event stream, matching a real
        // link where teardown ends the socket. An outlived handle only ends
        // its own stream, never its replacement's.
        {
            let mut slot = lock(&self.shared.event_tx);
            if slot.as_ref().is_some_and(|current| current.same_channel(&self.tx)) {
                slot.take();
            }
        }
        self.shared.ends.fetch_add(1, Ordering::SeqCst);
        self.shared.changed.notify_waiters();
    }
}

/// Platform side of the in-process transport.
///
/// Drives the link the way a real server would: emits events, decides the
/// paired identity, and records everything the session core dispatched.
#[derive(Clone)]
pub struct MemoryRemote {
    shared: Arc<Shared>,
}

impl MemoryRemote {
    /// Push an event into the live link. Returns `false` when no link is
    /// up (never connected, ended, or stream already closed).
    pub async fn emit(&self, event: TransportEvent) -> bool {
        let tx = lock(&self.shared.event_tx).clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// End the event stream without going through the handle, as when the
    /// server drops the connection with no close frame.
    pub fn close_stream(&self) {
        lock(&self.shared.event_tx).take();
        self.shared.changed.notify_waiters();
    }

    /// Set the identity reported by the current and future handles.
    pub fn set_identity(&self, identity: Option<&str>) {
        *lock(&self.shared.identity) = identity.map(str::to_string);
    }

    /// Whether a link is currently up.
    pub fn is_linked(&self) -> bool {
        lock(&self.shared.event_tx).is_some()
    }

    /// Everything dispatched through the link so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.shared.sent).clone()
    }

    /// Auth state presented by the most recent connect.
    pub fn last_auth(&self) -> Option<AuthState> {
        lock(&self.shared.auths).last().cloned()
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> u32 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Number of times a handle was ended.
    pub fn end_count(&self) -> u32 {
        self.shared.ends.load(Ordering::SeqCst)
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared.fail_next_connects.store(n, Ordering::SeqCst);
    }

    /// Park the next connect attempt after it registers its link, until
    /// `release_connect` is called. One-shot: later attempts pass through.
    pub fn hold_next_connect(&self) {
        self.shared.hold_next_connect.store(true, Ordering::SeqCst);
    }

    /// Release a parked connect attempt. A release issued before the
    /// attempt reaches the gate is remembered.
    pub fn release_connect(&self) {
        self.shared.release.notify_one();
    }

    /// Number of connect attempts currently parked at the gate.
    pub fn held_connects(&self) -> u32 {
        self.shared.held_connects.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` connect attempts are parked at the gate.
    pub async fn wait_for_held(&self, n: u32, timeout: Duration) -> bool {
        self.wait_for(timeout, || self.held_connects() >= n).await
    }

    /// Toggle send failures on the live link.
    pub fn set_fail_send(&self, fail: bool) {
        self.shared.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Wait until at least `n` connects happened.
    pub async fn wait_for_connects(&self, n: u32, timeout: Duration) -> bool {
        self.wait_for(timeout, || self.connect_count() >= n).await
    }

    /// Wait until at least `n` handle ends happened.
    pub async fn wait_for_ends(&self, n: u32, timeout: Duration) -> bool {
        self.wait_for(timeout, || self.end_count() >= n).await
    }

    /// Wait until at least `n` messages were dispatched.
    pub async fn wait_for_sent(&self, n: u32, timeout: Duration) -> bool {
        self.wait_for(timeout, || self.sent().len() as u32 >= n).await
    }

    async fn wait_for(&self, timeout: Duration, done: impl Fn() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let notified = self.shared.changed.notified();
            if done() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return done();
            }
        }
    }
}
