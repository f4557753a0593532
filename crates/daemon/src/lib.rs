//! # Iris Daemon Library
//!
//! This crate provides the daemon (host) side of Iris, owning the single
//! authenticated session against the messaging platform.
//!
//! ## Overview
//!
//! The daemon is the long-running service behind the desktop shell. It
//! provides:
//!
//! - **Session Lifecycle**: One managed link to the platform with automatic
//!   re-initialization after closes, revocations, and logouts
//! - **Pairing**: Caches the platform's pairing challenge and renders it as a
//!   QR code for the phone app to scan
//! - **Message Sending**: Validates and dispatches text and attachment
//!   messages through the open session
//! - **Deep Links**: Extracts `openLink` targets from platform URLs, tolerant
//!   of unencoded delimiters
//! - **IPC**: A Unix domain socket for CLI control and event streaming
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Daemon Orchestrator                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │   Session    │  │  Credential  │  │     Deep-Link      │  │
//! │  │   Manager    │  │    Store     │  │      Router        │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │               Transport Link (loopback)                │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │             IPC Server (Unix domain socket)            │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, DaemonOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load or create configuration
//!     let config = Config::load_default()?;
//!
//!     // Create and start the orchestrator
//!     let mut orchestrator = DaemonOrchestrator::new(config)?;
//!     orchestrator.start().await?;
//!
//!     // The daemon is now running and serving IPC requests
//!     // Wait for shutdown signal...
//!
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`session`]: Session lifecycle, identity extraction, send pipeline
//! - [`deeplink`]: Deep-link routing for `openLink` URLs
//! - [`ipc`]: Unix socket server, client, and wire messages
//! - [`ui`]: QR code rendering for pairing challenges
//! - [`orchestrator`]: Main daemon coordinator

pub mod config;
pub mod deeplink;
pub mod ipc;
pub mod orchestrator;
pub mod session;
pub mod ui;

// Re-export transport for convenience
pub use transport;

// Re-export config types for convenience
pub use config::Config;

// Re-export session types for convenience
pub use session::{
    extract_identity, Attachment, SendError, SessionManager, SessionSettings, SessionSnapshot,
    SessionStatus,
};

// Re-export deep-link routing for convenience
pub use deeplink::extract_open_link;

// Re-export IPC types for convenience
pub use ipc::{IpcClient, IpcRequest, IpcResponse, IpcServer, SessionEvent};

// Re-export UI helpers for convenience
pub use ui::{render_png_qr, render_terminal_qr};

// Re-export orchestrator types for convenience
pub use orchestrator::{DaemonOrchestrator, OrchestratorState};
