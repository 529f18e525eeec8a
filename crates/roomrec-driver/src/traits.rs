use async_trait::async_trait;
use thiserror::Error;

/// Errors from talking to the recording backend.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Recorder unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    #[error("Recorder rejected the shared secret")]
    AuthFailed,

    #[error("Not connected to the recorder")]
    NotConnected,

    #[error("Recorder call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Recorder refused the request: {0}")]
    RequestFailed(String),
}

/// Outcome of a start-recording call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The backend was already recording. Treated as success.
    AlreadyActive,
}

/// Outcome of a stop-recording call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The backend was not recording. Treated as success.
    NotActive,
}

/// The capability interface to a recording backend.
///
/// Implementations own their connection handle; `connect` establishes
/// it and `disconnect` drops it. A detected failure leaves the driver
/// disconnected, and callers re-`connect()` when they choose to; the
/// driver never reconnects behind the caller's back.
#[async_trait]
pub trait RecordingDriver: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Establish the control channel. Idempotent: connecting while
    /// already connected replaces the existing channel.
    async fn connect(&self) -> Result<(), DriverError>;

    /// Drop the control channel. Safe to call when not connected.
    async fn disconnect(&self);

    /// Ask the backend to start recording.
    async fn start_recording(&self) -> Result<StartOutcome, DriverError>;

    /// Ask the backend to stop recording.
    async fn stop_recording(&self) -> Result<StopOutcome, DriverError>;

    /// Cheap liveness probe of the control channel.
    async fn health_check(&self) -> bool;

    /// Backend version string, for startup logging and `--check`.
    async fn version(&self) -> Result<String, DriverError>;

    /// Best-effort path of the current/last recording output.
    ///
    /// Failure here never affects the success of a start/stop call;
    /// callers only log the result.
    async fn output_path(&self) -> Option<String>;
}
