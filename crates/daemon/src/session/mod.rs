//! Session lifecycle module.
//!
//! Owns the single authenticated platform session: initialization and
//! automatic recovery, pairing-challenge caching, identity normalization,
//! and the outbound send pipeline.

pub mod identity;
pub mod manager;
pub mod send;

pub use identity::extract_identity;
pub use manager::{SessionManager, SessionSettings, SessionSnapshot, SessionStatus};
pub use send::{Attachment, SendError};
