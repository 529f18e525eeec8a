use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::protocol::{ClientMessage, RequestType, ResponseStatus, ServerMessage};
use crate::traits::{DriverError, RecordingDriver, StartOutcome, StopOutcome};

/// Connection parameters for the recorder control channel.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret; only used when the server issues a challenge.
    pub secret: String,
    /// Upper bound for every protocol round-trip, connect included.
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4455,
            secret: String::new(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

struct Channel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Channel {
    async fn send(&mut self, msg: &ClientMessage) -> Result<(), DriverError> {
        let mut line = serde_json::to_string(msg)
            .map_err(|e| DriverError::Protocol(format!("failed to encode request: {}", e)))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(DriverError::Unreachable)
    }

    async fn recv(&mut self) -> Result<ServerMessage, DriverError> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(DriverError::Unreachable)?;
        if n == 0 {
            return Err(DriverError::Unreachable(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "recorder closed the connection",
            )));
        }
        serde_json::from_str(line.trim()).map_err(|e| {
            DriverError::Protocol(format!("unparseable message from recorder: {}", e))
        })
    }
}

/// Driver for a recorder reachable over a line-delimited JSON TCP
/// control channel.
///
/// The connection handle lives behind a mutex so the driver can be
/// shared via `Arc`. A timeout or I/O failure drops the handle; the
/// next call reports [`DriverError::NotConnected`] until the caller
/// decides to `connect()` again.
pub struct TcpRecorderDriver {
    config: RemoteConfig,
    channel: Mutex<Option<Channel>>,
    next_id: AtomicU64,
}

impl TcpRecorderDriver {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            channel: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn auth_response(secret: &str, challenge: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(challenge.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn handshake(&self, stream: TcpStream) -> Result<Channel, DriverError> {
        let (read, write) = stream.into_split();
        let mut channel = Channel {
            reader: BufReader::new(read),
            writer: write,
        };

        let hello = channel.recv().await?;
        let challenge = match hello {
            ServerMessage::Hello { version, challenge } => {
                debug!(version = %version, "Recorder greeted");
                challenge
            }
            other => {
                return Err(DriverError::Protocol(format!(
                    "expected hello, got {:?}",
                    other
                )))
            }
        };

        if let Some(challenge) = challenge {
            let auth = Self::auth_response(&self.config.secret, &challenge);
            channel.send(&ClientMessage::Identify { auth }).await?;
            match channel.recv().await? {
                ServerMessage::Identified => {}
                _ => return Err(DriverError::AuthFailed),
            }
        }

        Ok(channel)
    }

    /// One request/response exchange under the configured timeout.
    ///
    /// A transport failure or timeout drops the connection handle so
    /// the caller observes `NotConnected` until it reconnects. A
    /// backend-refused request is a complete exchange on a healthy
    /// channel and leaves it open.
    async fn round_trip(
        &self,
        request: RequestType,
    ) -> Result<(ResponseStatus, Option<String>), DriverError> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(DriverError::NotConnected)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let exchange = async {
            channel
                .send(&ClientMessage::Request {
                    id,
                    r#type: request,
                })
                .await?;
            loop {
                match channel.recv().await? {
                    ServerMessage::Response {
                        id: response_id,
                        status,
                        data,
                        comment,
                    } if response_id == id => {
                        if status == ResponseStatus::Error {
                            return Err(DriverError::RequestFailed(
                                comment.unwrap_or_else(|| "no detail given".to_string()),
                            ));
                        }
                        return Ok((status, data));
                    }
                    other => {
                        debug!(?other, "Ignoring unsolicited recorder message");
                    }
                }
            }
        };

        match tokio::time::timeout(self.config.request_timeout, exchange).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e @ DriverError::RequestFailed(_))) => {
                warn!(%request, error = %e, "Recorder refused the request");
                Err(e)
            }
            Ok(Err(e)) => {
                warn!(%request, error = %e, "Recorder exchange failed, dropping connection");
                *guard = None;
                Err(e)
            }
            Err(_) => {
                warn!(%request, "Recorder exchange timed out, dropping connection");
                *guard = None;
                Err(DriverError::Timeout(self.config.request_timeout))
            }
        }
    }
}

#[async_trait]
impl RecordingDriver for TcpRecorderDriver {
    fn name(&self) -> &str {
        "tcp-recorder"
    }

    async fn connect(&self) -> Result<(), DriverError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let connect = TcpStream::connect(&addr);
        let stream = match tokio::time::timeout(self.config.request_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(DriverError::Unreachable(e)),
            Err(_) => return Err(DriverError::Timeout(self.config.request_timeout)),
        };

        let channel =
            tokio::time::timeout(self.config.request_timeout, self.handshake(stream))
                .await
                .map_err(|_| DriverError::Timeout(self.config.request_timeout))??;

        *self.channel.lock().await = Some(channel);
        debug!(addr = %addr, "Connected to recorder");
        Ok(())
    }

    async fn disconnect(&self) {
        if self.channel.lock().await.take().is_some() {
            debug!("Disconnected from recorder");
        }
    }

    async fn start_recording(&self) -> Result<StartOutcome, DriverError> {
        match self.round_trip(RequestType::StartRecord).await? {
            (ResponseStatus::Ok, _) => Ok(StartOutcome::Started),
            (ResponseStatus::AlreadyActive, _) => Ok(StartOutcome::AlreadyActive),
            (status, _) => Err(DriverError::Protocol(format!(
                "unexpected status {:?} for StartRecord",
                status
            ))),
        }
    }

    async fn stop_recording(&self) -> Result<StopOutcome, DriverError> {
        match self.round_trip(RequestType::StopRecord).await? {
            (ResponseStatus::Ok, _) => Ok(StopOutcome::Stopped),
            (ResponseStatus::NotActive, _) => Ok(StopOutcome::NotActive),
            (status, _) => Err(DriverError::Protocol(format!(
                "unexpected status {:?} for StopRecord",
                status
            ))),
        }
    }

    async fn health_check(&self) -> bool {
        self.version().await.is_ok()
    }

    async fn version(&self) -> Result<String, DriverError> {
        let (_, data) = self.round_trip(RequestType::GetVersion).await?;
        Ok(data.unwrap_or_else(|| "unknown".to_string()))
    }

    async fn output_path(&self) -> Option<String> {
        match self.round_trip(RequestType::GetOutputPath).await {
            Ok((_, data)) => data,
            Err(e) => {
                debug!(error = %e, "Could not retrieve recording output path");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_is_hex_sha256_of_secret_and_challenge() {
        // sha256("secretnonce") computed independently
        let auth = TcpRecorderDriver::auth_response("secret", "nonce");
        assert_eq!(auth.len(), 64);
        assert!(auth.chars().all(|c| c.is_ascii_hexdigit()));
        // Same inputs, same digest; different challenge, different digest
        assert_eq!(auth, TcpRecorderDriver::auth_response("secret", "nonce"));
        assert_ne!(auth, TcpRecorderDriver::auth_response("secret", "other"));
    }

    #[test]
    fn test_default_config() {
        let config = RemoteConfig::default();
        assert_eq!(config.port, 4455);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
