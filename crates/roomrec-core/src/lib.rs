mod controller;
mod error;
mod presence;
mod sink;

pub use controller::{ControllerStatus, RecordingState, SessionController};
pub use error::ControllerError;
pub use presence::{ExclusionSet, Participant, PresenceTracker, TransitionOutcome};
pub use sink::ParticipantSink;

// The event vocabulary shared with producers
pub use roomrec_logging::EventSource;
pub use roomrec_tail::{EventKind, ParticipantEvent};
