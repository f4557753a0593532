//! IPC client for communicating with the daemon via Unix Domain Sockets.
//!
//! The client connects to the daemon's Unix socket and sends commands,
//! receiving responses in a request-response pattern. A connection can also
//! be switched into subscription mode to stream session events.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::messages::{IpcRequest, IpcResponse, SessionEvent};
use super::server::IpcError;
use crate::session::Attachment;

/// Default timeout for client operations in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// A client for communicating with the daemon via IPC.
pub struct IpcClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    timeout: Duration,
}

impl IpcClient {
    /// Connect to the daemon at the specified socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established. This
    /// typically indicates that the daemon is not running.
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path).await.map_err(IpcError::Io)?;
        let (read_half, write_half) = tokio::io::split(stream);

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Connect to the daemon with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established before the
    /// timeout elapses.
    pub async fn connect_with_timeout(path: &Path, timeout: Duration) -> Result<Self, IpcError> {
        let connect_future = UnixStream::connect(path);
        let stream = tokio::time::timeout(timeout, connect_future)
            .await
            .map_err(|_| {
                IpcError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection timed out",
                ))
            })?
            .map_err(IpcError::Io)?;

        let (read_half, write_half) = tokio::io::split(stream);

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout,
        })
    }

    /// Set the timeout for operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a request to the daemon and wait for a response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be serialized or sent, the
    /// response cannot be read or parsed, or the operation times out.
    pub async fn request(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        tokio::time::timeout(self.timeout, self.request_internal(request))
            .await
            .map_err(|_| {
                IpcError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "operation timed out",
                ))
            })?
    }

    async fn request_internal(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        let mut json = serde_json::to_string(&request).map_err(IpcError::Json)?;
        json.push('\n');

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(IpcError::Io)?;
        self.writer.flush().await.map_err(IpcError::Io)?;

        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(IpcError::Io)?;

        if bytes_read == 0 {
            return Err(IpcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "daemon closed connection",
            )));
        }

        let response = serde_json::from_str(line.trim()).map_err(IpcError::Json)?;
        Ok(response)
    }

    /// Send a ping request to check if the daemon is responsive.
    ///
    /// Returns `true` if the daemon responds with a Pong.
    pub async fn ping(&mut self) -> Result<bool, IpcError> {
        let response = self.request(IpcRequest::Ping).await?;
        Ok(matches!(response, IpcResponse::Pong))
    }

    /// Get the current session snapshot.
    pub async fn status(&mut self) -> Result<IpcResponse, IpcError> {
        self.request(IpcRequest::GetStatus).await
    }

    /// Get the current pairing challenge.
    pub async fn pairing_challenge(&mut self) -> Result<IpcResponse, IpcError> {
        self.request(IpcRequest::GetPairingChallenge).await
    }

    /// Get the identity of the linked account.
    pub async fn identity(&mut self) -> Result<IpcResponse, IpcError> {
        self.request(IpcRequest::GetIdentity).await
    }

    /// Start a session initialization attempt.
    pub async fn initialize(&mut self) -> Result<IpcResponse, IpcError> {
        self.request(IpcRequest::Initialize).await
    }

    /// Send a message through the daemon's open session.
    pub async fn send_message(
        &mut self,
        target: String,
        text: Option<String>,
        attachment: Option<Attachment>,
    ) -> Result<IpcResponse, IpcError> {
        self.request(IpcRequest::Send {
            target,
            text,
            attachment,
        })
        .await
    }

    /// Unlink from the account and restart pairing.
    pub async fn logout(&mut self) -> Result<IpcResponse, IpcError> {
        self.request(IpcRequest::Logout).await
    }

    /// Request the daemon to stop gracefully.
    pub async fn shutdown(&mut self) -> Result<IpcResponse, IpcError> {
        self.request(IpcRequest::Shutdown).await
    }

    /// Switch this connection into event streaming mode.
    ///
    /// After this call succeeds, use [`next_event`](Self::next_event) to
    /// receive session events. The connection can no longer be used for
    /// request-response traffic.
    pub async fn subscribe(&mut self) -> Result<(), IpcError> {
        match self.request(IpcRequest::Subscribe).await? {
            IpcResponse::Ok => Ok(()),
            IpcResponse::Error { message } => {
                Err(IpcError::Io(io::Error::new(io::ErrorKind::Other, message)))
            }
            other => Err(IpcError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected subscribe response: {other:?}"),
            ))),
        }
    }

    /// Read the next session event from a subscribed connection.
    ///
    /// Blocks without a timeout; event streams are open-ended. Returns
    /// `None` when the daemon closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be read or parsed, or if the
    /// daemon sends a non-event frame on a subscribed connection.
    pub async fn next_event(&mut self) -> Result<Option<SessionEvent>, IpcError> {
        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(IpcError::Io)?;

        if bytes_read == 0 {
            return Ok(None);
        }

        let response: IpcResponse = serde_json::from_str(line.trim()).map_err(IpcError::Json)?;
        match response {
            IpcResponse::Event(event) => Ok(Some(event)),
            other => Err(IpcError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected frame on event stream: {other:?}"),
            ))),
        }
    }
}
