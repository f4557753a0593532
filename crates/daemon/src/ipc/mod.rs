//! IPC module for CLI-daemon communication over Unix Domain Sockets.
//!
//! # Overview
//!
//! The daemon listens on a Unix Domain Socket and the CLI connects to it to
//! issue commands (status queries, sends, logout) and to subscribe to session
//! events. Messages are JSON-serialized, newline-delimited frames.
//!
//! # Socket Path
//!
//! The socket is created at `$XDG_RUNTIME_DIR/iris/daemon.sock` when
//! `XDG_RUNTIME_DIR` is set, falling back to `/tmp/iris-{uid}/daemon.sock`.
//!
//! # Examples
//!
//! ```no_run
//! use daemon::ipc::{get_socket_path, IpcClient, IpcRequest, IpcResponse};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = IpcClient::connect(&get_socket_path()).await?;
//! let response = client.request(IpcRequest::Ping).await?;
//! assert_eq!(response, IpcResponse::Pong);
//! # Ok(())
//! # }
//! ```

mod client;
mod messages;
pub mod pidfile;
mod server;

pub use client::IpcClient;
pub use messages::{IpcRequest, IpcResponse, SessionEvent};
pub use pidfile::{
    get_daemon_pid, get_pid_file_path, is_daemon_running, remove_pid_file, write_pid_file,
};
pub use server::{IpcConnection, IpcError, IpcServer};

use std::path::PathBuf;

/// Returns the path to the daemon's Unix Domain Socket.
///
/// Uses `$XDG_RUNTIME_DIR/iris/daemon.sock` if `XDG_RUNTIME_DIR` is set,
/// otherwise falls back to `/tmp/iris-{uid}/daemon.sock`.
#[cfg(unix)]
pub fn get_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir).join("iris").join("daemon.sock");
        }
    }

    // Fall back to /tmp with the uid embedded so that concurrent users do
    // not collide on a shared path.
    let uid = get_uid();
    PathBuf::from(format!("/tmp/iris-{uid}")).join("daemon.sock")
}

#[cfg(unix)]
fn get_uid() -> u32 {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata("/proc/self").map(|m| m.uid()).unwrap_or(0)
}
