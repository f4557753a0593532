//! Iris Daemon
//!
//! Headless service owning the messaging platform session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};
use daemon::config::{default_config_path, Config};
use daemon::deeplink::extract_open_link;
use daemon::ipc::{
    get_daemon_pid, get_socket_path, is_daemon_running, remove_pid_file, write_pid_file,
    IpcClient, IpcResponse, SessionEvent,
};
use daemon::orchestrator::DaemonOrchestrator;
use daemon::session::{Attachment, SessionSnapshot};
use daemon::ui::{render_png_qr, render_terminal_qr};

/// Iris Daemon - headless service owning the messaging platform session.
#[derive(Parser, Debug)]
#[command(name = "iris")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the Iris daemon in the foreground
    Start,

    /// Stop the running daemon
    Stop {
        /// Force immediate termination (SIGKILL)
        #[arg(long, short)]
        force: bool,

        /// Timeout in seconds for graceful shutdown (default: 30)
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Show the session status
    Status,

    /// Render the current pairing challenge as a QR code
    Qr {
        /// Write a PNG file instead of printing to the terminal
        #[arg(long, value_name = "FILE")]
        png: Option<PathBuf>,

        /// Invert the terminal rendering (for light-on-dark terminals)
        #[arg(long)]
        invert: bool,
    },

    /// Send a message through the open session
    Send {
        /// Target address; bare identifiers get the platform domain appended
        target: String,

        /// Message text (used as the caption when a file is attached)
        message: Option<String>,

        /// Attach a file to the message
        #[arg(long, value_name = "FILE")]
        attach: Option<PathBuf>,

        /// MIME type of the attachment (default: application/octet-stream)
        #[arg(long, value_name = "TYPE", requires = "attach")]
        mime: Option<String>,

        /// Filename presented to the recipient (default: the file's own name)
        #[arg(long, value_name = "NAME", requires = "attach")]
        filename: Option<String>,
    },

    /// Log out and wipe the stored credentials
    Logout,

    /// Stream session events until interrupted
    Watch,

    /// Extract the openLink target from a deep-link URL
    Link {
        /// Deep-link URL to parse
        url: String,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Write the effective configuration to the config file
    Init,

    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    // Handle commands
    match cli.command {
        Commands::Start => {
            // Check for an existing daemon BEFORE starting
            if is_daemon_running() {
                let pid = get_daemon_pid().unwrap_or(0);
                eprintln!("Error: Daemon already running (PID: {})", pid);
                eprintln!();
                eprintln!("To stop the existing daemon, run:");
                eprintln!("  iris stop");
                eprintln!();
                eprintln!("To check the session status, run:");
                eprintln!("  iris status");
                std::process::exit(1);
            }

            tracing::info!("Starting Iris daemon");
            let mut orchestrator = DaemonOrchestrator::new(config)?;
            run_daemon(&mut orchestrator).await?;
        }
        Commands::Stop { force, timeout } => {
            tracing::debug!("Stopping daemon (force: {})", force);

            if force {
                // Force stop using SIGKILL
                match force_stop_daemon() {
                    Ok(()) => {
                        println!("Daemon forcefully terminated");
                        std::process::exit(0);
                    }
                    Err(e) => {
                        eprintln!("Failed to stop daemon: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                // Graceful shutdown via IPC
                match graceful_stop_daemon(timeout).await {
                    Ok(()) => {
                        println!("Daemon stopped successfully");
                        std::process::exit(0);
                    }
                    Err(e) => {
                        eprintln!("Failed to stop daemon: {}", e);
                        eprintln!("Try: iris stop --force");
                        std::process::exit(1);
                    }
                }
            }
        }
        Commands::Status => {
            match query_daemon_status().await {
                Ok(snapshot) => {
                    print_status(&snapshot);
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("Daemon is not running: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Qr { png, invert } => {
            let challenge = match query_pairing_challenge().await {
                Ok(Some(challenge)) => challenge,
                Ok(None) => {
                    eprintln!("No pairing challenge available.");
                    eprintln!();
                    eprintln!("A challenge is only present while the session is connecting.");
                    eprintln!("Check the session state with:");
                    eprintln!("  iris status");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Daemon is not running: {}", e);
                    std::process::exit(1);
                }
            };

            match png {
                Some(output_path) => {
                    render_png_qr(&challenge, &output_path)?;
                    println!("QR code saved to: {}", output_path.display());
                }
                None => {
                    let qr = render_terminal_qr(&challenge, invert)?;
                    println!();
                    println!("Scan this QR code with the phone app to link:");
                    println!();
                    println!("{}", qr);
                }
            }
        }
        Commands::Send {
            target,
            message,
            attach,
            mime,
            filename,
        } => {
            let attachment = match attach {
                Some(path) => Some(load_attachment(&path, mime, filename)?),
                None => None,
            };

            match send_via_daemon(target, message, attachment).await {
                Ok(()) => {
                    println!("Message sent");
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("Failed to send: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Logout => {
            match logout_daemon().await {
                Ok(()) => {
                    println!("Logged out; stored credentials wiped");
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("Logout failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Watch => {
            if let Err(e) = watch_events().await {
                eprintln!("Watch failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Link { url } => match extract_open_link(&url) {
            Some(link) => println!("{}", link),
            None => {
                eprintln!("No openLink parameter found");
                std::process::exit(1);
            }
        },
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => {
                print!("{}", config.to_toml()?);
            }
            ConfigCommands::Init => {
                let path = cli.config.unwrap_or_else(default_config_path);
                if path.exists() {
                    eprintln!("Config file already exists: {}", path.display());
                    std::process::exit(1);
                }
                config.save(&path)?;
                println!("Wrote configuration to: {}", path.display());
            }
            ConfigCommands::Path => {
                println!("{}", default_config_path().display());
            }
        },
    }

    Ok(())
}

/// Run the daemon in the foreground until a shutdown signal arrives.
async fn run_daemon(orchestrator: &mut DaemonOrchestrator) -> anyhow::Result<()> {
    // Record our PID so `iris stop --force` can find us
    write_pid_file().context("Failed to write PID file")?;

    // Start the orchestrator
    if let Err(e) = orchestrator.start().await {
        remove_pid_file();
        return Err(e);
    }

    // Wait for a shutdown signal or an IPC shutdown request
    let shutdown = orchestrator.shutdown_token();
    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
        _ = shutdown.cancelled() => {
            tracing::info!("Shutdown requested over IPC");
        }
    }

    // Stop the orchestrator
    let result = orchestrator.stop().await;
    remove_pid_file();
    result
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}

/// Print a session snapshot in human-readable form.
fn print_status(snapshot: &SessionSnapshot) {
    println!("Session Status: {}", snapshot.status);
    match &snapshot.pairing_challenge {
        Some(_) => println!("  Pairing:  challenge available (run `iris qr`)"),
        None => println!("  Pairing:  none"),
    }
    println!(
        "  Identity: {}",
        snapshot.identity.as_deref().unwrap_or("-")
    );
}

/// Read a file and wrap it as a base64-encoded attachment.
fn load_attachment(
    path: &Path,
    mime: Option<String>,
    filename: Option<String>,
) -> anyhow::Result<Attachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read attachment: {}", path.display()))?;

    let filename =
        filename.or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()));

    Ok(Attachment {
        data: BASE64.encode(&bytes),
        mime_type: mime.unwrap_or_else(|| "application/octet-stream".to_string()),
        filename,
    })
}

/// Query the session snapshot via IPC.
async fn query_daemon_status() -> anyhow::Result<SessionSnapshot> {
    let socket_path = get_socket_path();

    // Connect with timeout
    let mut client = IpcClient::connect_with_timeout(&socket_path, Duration::from_secs(5))
        .await
        .map_err(|e| anyhow::anyhow!("Cannot connect to daemon: {}", e))?;

    let response = client
        .status()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to query status: {}", e))?;

    match response {
        IpcResponse::Status(snapshot) => Ok(snapshot),
        IpcResponse::Error { message } => {
            anyhow::bail!("Daemon returned error: {}", message)
        }
        _ => anyhow::bail!("Unexpected response from daemon"),
    }
}

/// Query the current pairing challenge via IPC.
async fn query_pairing_challenge() -> anyhow::Result<Option<String>> {
    let socket_path = get_socket_path();

    let mut client = IpcClient::connect_with_timeout(&socket_path, Duration::from_secs(5))
        .await
        .map_err(|e| anyhow::anyhow!("Cannot connect to daemon: {}", e))?;

    let response = client
        .pairing_challenge()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to query pairing challenge: {}", e))?;

    match response {
        IpcResponse::PairingChallenge { challenge } => Ok(challenge),
        IpcResponse::Error { message } => {
            anyhow::bail!("Daemon returned error: {}", message)
        }
        _ => anyhow::bail!("Unexpected response from daemon"),
    }
}

/// Send a message through the daemon via IPC.
async fn send_via_daemon(
    target: String,
    text: Option<String>,
    attachment: Option<Attachment>,
) -> anyhow::Result<()> {
    let socket_path = get_socket_path();

    let mut client = IpcClient::connect_with_timeout(&socket_path, Duration::from_secs(5))
        .await
        .map_err(|_| anyhow::anyhow!("Daemon is not running (cannot connect to socket)"))?;

    let response = client
        .send_message(target, text, attachment)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send request: {}", e))?;

    match response {
        IpcResponse::Ok => Ok(()),
        IpcResponse::Error { message } => anyhow::bail!("{}", message),
        _ => anyhow::bail!("Unexpected response from daemon"),
    }
}

/// Request a logout via IPC.
async fn logout_daemon() -> anyhow::Result<()> {
    let socket_path = get_socket_path();

    let mut client = IpcClient::connect_with_timeout(&socket_path, Duration::from_secs(5))
        .await
        .map_err(|_| anyhow::anyhow!("Daemon is not running (cannot connect to socket)"))?;

    let response = client
        .logout()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send logout request: {}", e))?;

    match response {
        IpcResponse::Ok => Ok(()),
        IpcResponse::Error { message } => anyhow::bail!("{}", message),
        _ => anyhow::bail!("Unexpected response from daemon"),
    }
}

/// Subscribe to the daemon's event stream and print events as they arrive.
///
/// Runs until the daemon closes the stream or the process is interrupted.
async fn watch_events() -> anyhow::Result<()> {
    let socket_path = get_socket_path();

    let mut client = IpcClient::connect_with_timeout(&socket_path, Duration::from_secs(5))
        .await
        .map_err(|_| anyhow::anyhow!("Daemon is not running (cannot connect to socket)"))?;

    client
        .subscribe()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to subscribe: {}", e))?;

    println!("Watching session events (Ctrl-C to stop)");

    loop {
        match client.next_event().await {
            Ok(Some(SessionEvent::StatusChanged { status })) => {
                println!("status: {}", status);
            }
            Ok(Some(SessionEvent::PairingUpdated { challenge })) => match challenge {
                Some(_) => println!("pairing: challenge available (run `iris qr`)"),
                None => println!("pairing: cleared"),
            },
            Ok(None) => {
                println!("Daemon closed the event stream");
                return Ok(());
            }
            Err(e) => return Err(anyhow::anyhow!("Event stream error: {}", e)),
        }
    }
}

/// Gracefully stop the daemon via IPC.
///
/// Sends a shutdown request to the daemon and waits for it to exit.
async fn graceful_stop_daemon(timeout_secs: u64) -> anyhow::Result<()> {
    use daemon::ipc::get_pid_file_path;

    let socket_path = get_socket_path();

    // Connect to daemon
    let mut client = IpcClient::connect_with_timeout(&socket_path, Duration::from_secs(5))
        .await
        .map_err(|_| anyhow::anyhow!("Daemon is not running (cannot connect to socket)"))?;

    println!("Sending shutdown request...");

    // Send shutdown request with custom timeout
    client.set_timeout(Duration::from_secs(timeout_secs));
    let response = client
        .shutdown()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send stop request: {}", e))?;

    match response {
        IpcResponse::Ok => {
            println!("Shutdown acknowledged, waiting for daemon to exit...");
        }
        IpcResponse::Error { message } => {
            anyhow::bail!("Daemon returned error: {}", message);
        }
        _ => {
            anyhow::bail!("Unexpected response from daemon");
        }
    }

    // Wait for the daemon to actually exit by polling the socket
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    while start.elapsed() < timeout {
        // Check if socket is gone (daemon exited)
        if !socket_path.exists() {
            return Ok(());
        }

        // Try to connect - if it fails, the daemon is shutting down
        if IpcClient::connect_with_timeout(&socket_path, Duration::from_millis(100))
            .await
            .is_err()
        {
            // Clean up stale PID file if it exists
            let pid_path = get_pid_file_path();
            let _ = std::fs::remove_file(&pid_path);
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Err(anyhow::anyhow!(
        "Timeout waiting for daemon to exit ({}s)",
        timeout_secs
    ))
}

/// Force stop the daemon using SIGKILL.
///
/// Reads the daemon PID from the PID file and sends SIGKILL.
fn force_stop_daemon() -> anyhow::Result<()> {
    use daemon::ipc::get_pid_file_path;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid_path = get_pid_file_path();

    if !pid_path.exists() {
        return Err(anyhow::anyhow!(
            "Daemon PID file not found - is the daemon running?"
        ));
    }

    let pid_str = std::fs::read_to_string(&pid_path)
        .map_err(|e| anyhow::anyhow!("Failed to read PID file: {}", e))?;
    let pid: i32 = pid_str
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid PID in file: {}", e))?;

    // Send SIGKILL
    kill(Pid::from_raw(pid), Signal::SIGKILL)
        .map_err(|e| anyhow::anyhow!("Failed to kill daemon (PID {}): {}", pid, e))?;

    println!("Sent SIGKILL to daemon (PID {})", pid);

    // Clean up PID file
    let _ = std::fs::remove_file(&pid_path);

    // Clean up socket file
    let socket_path = get_socket_path();
    let _ = std::fs::remove_file(&socket_path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_start_command() {
        let cli = Cli::try_parse_from(["iris", "start"]).unwrap();
        assert!(matches!(cli.command, Commands::Start));
    }

    #[test]
    fn test_stop_command() {
        let cli = Cli::try_parse_from(["iris", "stop"]).unwrap();
        match cli.command {
            Commands::Stop { force, timeout } => {
                assert!(!force);
                assert_eq!(timeout, 30);
            }
            _ => panic!("Expected Stop command"),
        }
    }

    #[test]
    fn test_stop_with_force() {
        let cli = Cli::try_parse_from(["iris", "stop", "--force"]).unwrap();
        match cli.command {
            Commands::Stop { force, timeout } => {
                assert!(force);
                assert_eq!(timeout, 30);
            }
            _ => panic!("Expected Stop command"),
        }
    }

    #[test]
    fn test_stop_with_short_force() {
        let cli = Cli::try_parse_from(["iris", "stop", "-f"]).unwrap();
        match cli.command {
            Commands::Stop { force, timeout } => {
                assert!(force);
                assert_eq!(timeout, 30);
            }
            _ => panic!("Expected Stop command"),
        }
    }

    #[test]
    fn test_stop_with_timeout() {
        let cli = Cli::try_parse_from(["iris", "stop", "--timeout", "60"]).unwrap();
        match cli.command {
            Commands::Stop { force, timeout } => {
                assert!(!force);
                assert_eq!(timeout, 60);
            }
            _ => panic!("Expected Stop command"),
        }
    }

    #[test]
    fn test_stop_with_force_and_timeout() {
        let cli = Cli::try_parse_from(["iris", "stop", "--force", "--timeout", "10"]).unwrap();
        match cli.command {
            Commands::Stop { force, timeout } => {
                assert!(force);
                assert_eq!(timeout, 10);
            }
            _ => panic!("Expected Stop command"),
        }
    }

    #[test]
    fn test_status_command() {
        let cli = Cli::try_parse_from(["iris", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_qr_defaults() {
        let cli = Cli::try_parse_from(["iris", "qr"]).unwrap();
        match cli.command {
            Commands::Qr { png, invert } => {
                assert!(png.is_none());
                assert!(!invert);
            }
            _ => panic!("Expected Qr command"),
        }
    }

    #[test]
    fn test_qr_with_png() {
        let cli = Cli::try_parse_from(["iris", "qr", "--png", "/tmp/pairing.png"]).unwrap();
        match cli.command {
            Commands::Qr { png, invert } => {
                assert_eq!(png, Some(PathBuf::from("/tmp/pairing.png")));
                assert!(!invert);
            }
            _ => panic!("Expected Qr command"),
        }
    }

    #[test]
    fn test_qr_with_invert() {
        let cli = Cli::try_parse_from(["iris", "qr", "--invert"]).unwrap();
        match cli.command {
            Commands::Qr { png, invert } => {
                assert!(png.is_none());
                assert!(invert);
            }
            _ => panic!("Expected Qr command"),
        }
    }

    #[test]
    fn test_send_target_only() {
        let cli = Cli::try_parse_from(["iris", "send", "11987654321"]).unwrap();
        match cli.command {
            Commands::Send {
                target,
                message,
                attach,
                mime,
                filename,
            } => {
                assert_eq!(target, "11987654321");
                assert!(message.is_none());
                assert!(attach.is_none());
                assert!(mime.is_none());
                assert!(filename.is_none());
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_send_with_message() {
        let cli = Cli::try_parse_from(["iris", "send", "11987654321", "hello there"]).unwrap();
        match cli.command {
            Commands::Send {
                target, message, ..
            } => {
                assert_eq!(target, "11987654321");
                assert_eq!(message, Some("hello there".to_string()));
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_send_with_attachment() {
        let cli = Cli::try_parse_from([
            "iris",
            "send",
            "11987654321",
            "caption",
            "--attach",
            "/tmp/photo.png",
            "--mime",
            "image/png",
        ])
        .unwrap();
        match cli.command {
            Commands::Send {
                target,
                message,
                attach,
                mime,
                filename,
            } => {
                assert_eq!(target, "11987654321");
                assert_eq!(message, Some("caption".to_string()));
                assert_eq!(attach, Some(PathBuf::from("/tmp/photo.png")));
                assert_eq!(mime, Some("image/png".to_string()));
                assert!(filename.is_none());
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_send_with_filename() {
        let cli = Cli::try_parse_from([
            "iris",
            "send",
            "11987654321",
            "--attach",
            "/tmp/report.pdf",
            "--filename",
            "q3-report.pdf",
        ])
        .unwrap();
        match cli.command {
            Commands::Send {
                attach, filename, ..
            } => {
                assert_eq!(attach, Some(PathBuf::from("/tmp/report.pdf")));
                assert_eq!(filename, Some("q3-report.pdf".to_string()));
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_send_mime_requires_attach() {
        let result = Cli::try_parse_from(["iris", "send", "11987654321", "--mime", "image/png"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_filename_requires_attach() {
        let result =
            Cli::try_parse_from(["iris", "send", "11987654321", "--filename", "a.pdf"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_requires_target() {
        let result = Cli::try_parse_from(["iris", "send"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_logout_command() {
        let cli = Cli::try_parse_from(["iris", "logout"]).unwrap();
        assert!(matches!(cli.command, Commands::Logout));
    }

    #[test]
    fn test_watch_command() {
        let cli = Cli::try_parse_from(["iris", "watch"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch));
    }

    #[test]
    fn test_link_command() {
        let cli = Cli::try_parse_from(["iris", "link", "iris://?openLink=https://example.com"])
            .unwrap();
        match cli.command {
            Commands::Link { url } => {
                assert_eq!(url, "iris://?openLink=https://example.com");
            }
            _ => panic!("Expected Link command"),
        }
    }

    #[test]
    fn test_link_requires_url() {
        let result = Cli::try_parse_from(["iris", "link"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::try_parse_from(["iris", "config", "show"]).unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Show) => {}
            _ => panic!("Expected Config Show command"),
        }
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::try_parse_from(["iris", "config", "init"]).unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Init) => {}
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::try_parse_from(["iris", "config", "path"]).unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Path) => {}
            _ => panic!("Expected Config Path command"),
        }
    }

    #[test]
    fn test_global_verbose_flag() {
        let cli = Cli::try_parse_from(["iris", "--verbose", "status"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_global_short_verbose_flag() {
        let cli = Cli::try_parse_from(["iris", "-v", "status"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["iris", "--config", "/path/to/config.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_global_short_config_flag() {
        let cli = Cli::try_parse_from(["iris", "-c", "/path/to/config.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_config_path_relative() {
        let cli = Cli::try_parse_from(["iris", "-c", "./relative/path.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("./relative/path.toml")));
    }

    #[test]
    fn test_invalid_command_fails() {
        let result = Cli::try_parse_from(["iris", "invalid"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_subcommand_fails() {
        let result = Cli::try_parse_from(["iris"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_without_subcommand_fails() {
        let result = Cli::try_parse_from(["iris", "config"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_available() {
        let result = Cli::try_parse_from(["iris", "--help"]);
        // --help causes an early exit, which is treated as an error by try_parse
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_start_help_available() {
        let result = Cli::try_parse_from(["iris", "start", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_verbose_after_command() {
        // Global flags can also come after the command
        let cli = Cli::try_parse_from(["iris", "status", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_config_after_command() {
        let cli = Cli::try_parse_from(["iris", "status", "--config", "/etc/iris.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/iris.toml")));
    }

    #[test]
    fn test_load_attachment_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello attachment").unwrap();

        let attachment = load_attachment(&path, None, None).unwrap();
        assert_eq!(attachment.data, BASE64.encode(b"hello attachment"));
        assert_eq!(attachment.mime_type, "application/octet-stream");
        assert_eq!(attachment.filename, Some("notes.txt".to_string()));
    }

    #[test]
    fn test_load_attachment_explicit_mime_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.bin");
        std::fs::write(&path, [0x89, 0x50, 0x4E, 0x47]).unwrap();

        let attachment = load_attachment(
            &path,
            Some("image/png".to_string()),
            Some("holiday.png".to_string()),
        )
        .unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.filename, Some("holiday.png".to_string()));
    }

    #[test]
    fn test_load_attachment_missing_file() {
        let result = load_attachment(Path::new("/nonexistent/file.bin"), None, None);
        assert!(result.is_err());
    }
}
