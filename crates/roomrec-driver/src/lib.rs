//! # roomrec-driver
//!
//! Abstraction over the external recording backend.
//!
//! The [`RecordingDriver`] trait isolates the presence state machine
//! from the backend's control protocol. All mutating operations are
//! idempotent: starting an already-recording backend or stopping an
//! already-idle one is a distinguishable success, never an error the
//! caller has to special-case.
//!
//! [`TcpRecorderDriver`] is the production implementation, speaking a
//! line-delimited JSON control protocol with shared-secret challenge
//! authentication. It never reconnects on its own; after a detected
//! failure the caller decides when to `connect()` again.

mod protocol;
mod remote;
mod traits;

pub use protocol::{ClientMessage, RequestType, ResponseStatus, ServerMessage};
pub use remote::{RemoteConfig, TcpRecorderDriver};
pub use traits::{DriverError, RecordingDriver, StartOutcome, StopOutcome};
