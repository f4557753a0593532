//! Events emitted by a platform link.
//!
//! A live link pushes [`TransportEvent`]s to its consumer. One event may
//! carry a fresh pairing challenge, a connection-state signal, or both;
//! fields the platform did not populate are `None`.

use serde::{Deserialize, Serialize};

/// Close cause reported when the platform has permanently revoked the
/// session's credentials. Reconnecting with the same auth state is
/// pointless; the store must be wiped and pairing restarted.
pub const CLOSE_CAUSE_SESSION_REVOKED: u32 = 401;

/// Connection-state signal carried by a [`TransportEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionSignal {
    /// The link is negotiating with the platform.
    Connecting,
    /// The link is authenticated and ready to carry messages.
    Open,
    /// The link ended. `cause` is a platform status code when one was
    /// reported; see [`CLOSE_CAUSE_SESSION_REVOKED`].
    Close {
        /// Numeric close cause, if the platform reported one.
        cause: Option<u32>,
    },
}

/// A single event pushed by a platform link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEvent {
    /// A new pairing challenge superseding any previous one.
    pub pairing_challenge: Option<String>,
    /// A connection-state transition, when one occurred.
    pub signal: Option<ConnectionSignal>,
}

impl TransportEvent {
    /// Event carrying only a fresh pairing challenge.
    pub fn challenge(payload: impl Into<String>) -> Self {
        Self {
            pairing_challenge: Some(payload.into()),
            signal: None,
        }
    }

    /// Event carrying only a connection-state signal.
    pub fn signal(signal: ConnectionSignal) -> Self {
        Self {
            pairing_challenge: None,
            signal: Some(signal),
        }
    }

    /// Event signalling an authenticated, open link.
    pub fn open() -> Self {
        Self::signal(ConnectionSignal::Open)
    }

    /// Event signalling a closed link with an optional cause code.
    pub fn close(cause: Option<u32>) -> Self {
        Self::signal(ConnectionSignal::Close { cause })
    }
}
