use async_trait::async_trait;

use roomrec_logging::EventSource;

/// Ingestion entry points for participant events.
///
/// Every producer — the log-tail pump, the OSC listener — delivers its
/// events through this interface and knows nothing about tracking or
/// recording. The controller implements it and serializes all callers
/// through its single critical section.
#[async_trait]
pub trait ParticipantSink: Send + Sync {
    async fn participant_joined(&self, display_name: &str, participant_id: &str, source: EventSource);

    async fn participant_left(&self, display_name: &str, participant_id: &str, source: EventSource);
}
