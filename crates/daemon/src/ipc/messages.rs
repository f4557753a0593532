//! IPC message types for CLI-daemon communication.
//!
//! This module defines the request and response types used for communication
//! between the CLI and the daemon over Unix Domain Sockets, plus the session
//! events streamed to subscribed clients.

use serde::{Deserialize, Serialize};

use crate::session::{Attachment, SessionSnapshot, SessionStatus};

/// Requests that can be sent from the CLI to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcRequest {
    /// Check if the daemon is alive.
    Ping,
    /// Get the current session snapshot (status, pairing challenge, identity).
    GetStatus,
    /// Get the current pairing challenge, if one is cached.
    GetPairingChallenge,
    /// Get the identity of the linked account, if the session is open.
    GetIdentity,
    /// Start a session initialization attempt.
    Initialize,
    /// Send a message through the open session.
    Send {
        /// Recipient address. A bare subscriber number is qualified with the
        /// platform domain by the daemon.
        target: String,
        /// Message text, or caption when an attachment is present.
        text: Option<String>,
        /// Optional attachment carried as base64 payload plus metadata.
        attachment: Option<Attachment>,
    },
    /// Unlink from the account: wipe credentials and restart pairing.
    Logout,
    /// Switch this connection into event streaming mode.
    Subscribe,
    /// Request the daemon to stop gracefully.
    Shutdown,
}

/// Responses sent from the daemon to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcResponse {
    /// Response to a Ping request.
    Pong,
    /// Current session snapshot.
    Status(SessionSnapshot),
    /// Current pairing challenge, or null when none is cached.
    PairingChallenge {
        /// Opaque pairing string to render as a QR code, if available.
        challenge: Option<String>,
    },
    /// Identity of the linked account, or null when the session is not open.
    Identity {
        /// Subscriber number with the country prefix stripped.
        identity: Option<String>,
    },
    /// The request was accepted and carried out.
    Ok,
    /// An error occurred processing the request.
    Error {
        /// Human-readable error message.
        message: String,
    },
    /// A session event, streamed to subscribed connections.
    Event(SessionEvent),
}

/// Session lifecycle events pushed to subscribed clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SessionEvent {
    /// The session status changed.
    StatusChanged {
        /// The new session status.
        status: SessionStatus,
    },
    /// The pairing challenge changed; null means it was cleared.
    PairingUpdated {
        /// The new pairing challenge, if any.
        challenge: Option<String>,
    },
}
