//! The seam between the session core and the wire implementation.
//!
//! The daemon never speaks the platform protocol itself. It opens links
//! through a [`TransportConnector`], watches the event stream each link
//! returns, and talks back through the [`TransportHandle`]. Anything that
//! satisfies these traits can sit on the other side: the production wire
//! client, or the in-process [`memory`](crate::memory) pair used by tests
//! and the loopback run mode.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::event::TransportEvent;
use crate::payload::OutboundPayload;
use crate::store::AuthState;

/// Factory for platform links.
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    /// The link type this connector produces.
    type Handle: TransportHandle;

    /// Open a link using the given auth state.
    ///
    /// Returns the handle plus the event stream for this link. The stream
    /// ends (receiver yields `None`) when the link is torn down; a
    /// well-behaved implementation emits a `Close` signal first, but the
    /// consumer must treat a bare end-of-stream as a close too.
    async fn connect(
        &self,
        auth: AuthState,
    ) -> Result<(Self::Handle, mpsc::Receiver<TransportEvent>)>;
}

/// One live, possibly-authenticated connection to the platform.
#[async_trait]
pub trait TransportHandle: Send + Sync + 'static {
    /// The platform self-identity string, once authenticated.
    ///
    /// Raw platform form, e.g. `5511987654321:3@s.iris.net`. `None` until
    /// the link has opened.
    fn identity(&self) -> Option<String>;

    /// Dispatch one outbound message to a fully qualified target.
    async fn send(&self, target: &str, payload: OutboundPayload) -> Result<()>;

    /// Tear the link down. Safe to call more than once.
    async fn end(&self);
}
