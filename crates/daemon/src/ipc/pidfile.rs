//! PID file utilities for daemon running detection.
//!
//! This module provides functions to record the daemon's PID on startup and
//! to check whether a daemon is already running by examining the PID file
//! and verifying the process exists.
//!
//! ## PID File Location
//!
//! The PID file is stored at:
//! - `$XDG_DATA_HOME/iris/daemon.pid` if XDG_DATA_HOME is set
//! - `~/.local/share/iris/daemon.pid` otherwise

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Get the path to the daemon PID file.
///
/// The path follows the XDG Base Directory Specification:
/// - `$XDG_DATA_HOME/iris/daemon.pid` if XDG_DATA_HOME is set
/// - `~/.local/share/iris/daemon.pid` otherwise
pub fn get_pid_file_path() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local/share")
        });
    data_dir.join("iris").join("daemon.pid")
}

/// Record the current process as the running daemon.
///
/// Creates the parent directory if needed and overwrites any existing file.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_pid_file() -> io::Result<()> {
    let path = get_pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, format!("{}\n", std::process::id()))
}

/// Remove the daemon PID file, ignoring a missing file.
pub fn remove_pid_file() {
    let _ = fs::remove_file(get_pid_file_path());
}

/// Check if a daemon process is currently running.
///
/// Returns `true` if the PID file exists, contains a valid PID, and a
/// process with that PID is running. Cleans up stale PID files
/// automatically.
pub fn is_daemon_running() -> bool {
    get_daemon_pid().is_some()
}

/// Get the PID of the running daemon, if any.
///
/// Returns `Some(pid)` if a daemon is running, `None` otherwise.
/// Automatically cleans up stale PID files.
pub fn get_daemon_pid() -> Option<u32> {
    pid_from_file(&get_pid_file_path())
}

/// Read and validate a PID from the given file.
///
/// A file holding an unparseable or dead PID is removed.
fn pid_from_file(path: &Path) -> Option<u32> {
    let pid_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return None,
    };

    let pid: u32 = match pid_str.trim().parse() {
        Ok(p) => p,
        Err(_) => {
            cleanup_stale_pid_file(path);
            return None;
        }
    };

    if is_process_running(pid) {
        Some(pid)
    } else {
        cleanup_stale_pid_file(path);
        None
    }
}

/// Check if a process with the given PID is running.
///
/// On Linux, this checks if `/proc/{pid}/stat` exists.
/// On other Unix systems, this probes with a null signal.
fn is_process_running(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        let proc_path = format!("/proc/{}/stat", pid);
        Path::new(&proc_path).exists()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    {
        // kill with a null signal checks existence without delivering anything
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

fn cleanup_stale_pid_file(path: &Path) {
    let _ = fs::remove_file(path);
}
