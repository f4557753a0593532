//! Iris transport contract
//!
//! Defines the boundary between the session core and the wire
//! implementation that talks to the messaging platform:
//! - Link traits: [`TransportConnector`] opens a link, [`TransportHandle`]
//!   drives it
//! - Events flowing out of a link: [`TransportEvent`], [`ConnectionSignal`]
//! - Outbound message payloads: [`OutboundPayload`]
//! - The on-disk credential store: [`CredentialStore`], [`AuthState`]
//! - An in-process implementation ([`memory`]) for tests and the daemon's
//!   loopback mode

pub mod error;
pub mod event;
pub mod link;
pub mod memory;
pub mod payload;
pub mod store;

pub use error::{Result, TransportError};
pub use event::{ConnectionSignal, TransportEvent, CLOSE_CAUSE_SESSION_REVOKED};
pub use link::{TransportConnector, TransportHandle};
pub use memory::{MemoryConnector, MemoryHandle, MemoryRemote, SentMessage};
pub use payload::OutboundPayload;
pub use store::{AuthState, CredentialStore};

/// Domain of platform addresses.
///
/// Bare targets are qualified with this domain before dispatch; paired
/// identities carry it in their raw form.
pub const PLATFORM_DOMAIN: &str = "s.iris.net";
