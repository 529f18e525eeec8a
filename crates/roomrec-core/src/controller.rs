use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use roomrec_driver::{DriverError, RecordingDriver, StartOutcome};
use roomrec_logging::{EventSource, LogEvent, Logger};
use roomrec_tail::{parse_line, EventKind, LogTailer, ParticipantEvent};

use crate::error::ControllerError;
use crate::presence::{ExclusionSet, Participant, PresenceTracker, TransitionOutcome};
use crate::sink::ParticipantSink;

/// What the controller believes the backend is doing.
///
/// Mirrors, but is not instantaneously consistent with, the backend's
/// true state: after a failed driver call the two can diverge until
/// the next successful call. The divergence is visible through
/// `driver_call_failed` log events, never hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Idle,
    Recording,
}

/// Point-in-time snapshot for display surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub running: bool,
    pub recording: RecordingState,
    pub transition_seq: u64,
    pub backend_connected: bool,
    pub participants: Vec<Participant>,
}

/// Everything a transition decision reads or writes. Kept behind one
/// mutex so concurrent producers cannot interleave inside a 0<->1
/// window and double-start or miss a stop.
struct Shared {
    tracker: PresenceTracker,
    exclusions: Arc<ExclusionSet>,
    recording: RecordingState,
    transition_seq: u64,
    connected: bool,
}

/// Orchestrates presence tracking and recording control.
///
/// Owns the log-tail poll loop; other producers (the OSC listener)
/// deliver through the [`ParticipantSink`] impl. All ingestion paths
/// serialize through the internal mutex, and the driver call for a
/// transition happens inside that same critical section.
pub struct SessionController<D: RecordingDriver> {
    driver: D,
    logger: Arc<Logger>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    running: AtomicBool,
    state: Mutex<Shared>,
    tailer: Mutex<Option<LogTailer>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<D: RecordingDriver + 'static> SessionController<D> {
    pub fn new(driver: D, tailer: LogTailer, logger: Arc<Logger>) -> Self {
        Self {
            driver,
            logger,
            poll_interval: Duration::from_millis(500),
            shutdown: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
            state: Mutex::new(Shared {
                tracker: PresenceTracker::new(),
                exclusions: Arc::new(ExclusionSet::default()),
                recording: RecordingState::Idle,
                transition_seq: 0,
                connected: false,
            }),
            tailer: Mutex::new(Some(tailer)),
            pump: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.state.get_mut().exclusions = Arc::new(exclusions);
        self
    }

    /// Flag shared with background producers; set by [`stop`].
    ///
    /// The binary hands this to the OSC listener so one shutdown signal
    /// terminates every producer within one poll interval.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Connect the backend and begin the poll loop.
    ///
    /// A connect failure aborts startup: the monitor refuses to run
    /// without a reachable recording backend.
    pub async fn start(self: Arc<Self>) -> Result<(), ControllerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::AlreadyRunning);
        }
        self.shutdown.store(false, Ordering::SeqCst);

        if let Err(e) = self.driver.connect().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        let version = self.driver.version().await.ok();
        self.state.lock().await.connected = true;
        self.logger.log(&LogEvent::BackendConnected {
            backend: self.driver.name().to_string(),
            version,
        });

        let tailer = self.tailer.lock().await.take();
        let controller = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            controller.pump_loop(tailer).await;
        });
        *self.pump.lock().await = Some(handle);

        Ok(())
    }

    /// Stop producers, stop recording if active, and disconnect.
    ///
    /// Idempotent; a never-started controller treats this as a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.store(true, Ordering::SeqCst);

        // The pump notices the flag within one poll interval; an
        // in-flight driver call is awaited, not aborted, so the backend
        // is never left mid-request.
        let handle = self.pump.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let mut state = self.state.lock().await;
        if state.recording == RecordingState::Recording {
            self.try_stop_recording(&mut state).await;
        }
        state.tracker.clear();
        state.connected = false;
        let transitions = state.transition_seq;
        drop(state);

        self.driver.disconnect().await;
        self.logger.log(&LogEvent::BackendDisconnected);
        self.logger.log(&LogEvent::MonitorStopped { transitions });
    }

    pub async fn status(&self) -> ControllerStatus {
        let state = self.state.lock().await;
        ControllerStatus {
            running: self.running.load(Ordering::SeqCst),
            recording: state.recording,
            transition_seq: state.transition_seq,
            backend_connected: state.connected,
            participants: state.tracker.participants(),
        }
    }

    /// Replace the exclusion set. A single pointer swap under the
    /// controller lock, so readers always see a fully-formed set.
    pub async fn reload_exclusions(&self, exclusions: ExclusionSet) {
        let names = exclusions.name_count();
        let ids = exclusions.id_count();
        self.state.lock().await.exclusions = Arc::new(exclusions);
        self.logger.log(&LogEvent::ExclusionsReloaded { names, ids });
    }

    async fn pump_loop(self: Arc<Self>, tailer: Option<LogTailer>) {
        let Some(mut tailer) = tailer else {
            warn!("No log tailer available; tail producer not running");
            return;
        };

        while !self.shutdown.load(Ordering::SeqCst) {
            match tailer.poll() {
                Ok(poll) => {
                    if poll.rotated {
                        self.logger.log(&LogEvent::LogRotated {
                            path: tailer.path().to_path_buf(),
                        });
                    }
                    for line in &poll.lines {
                        if let Some(event) = parse_line(line) {
                            self.ingest(event, EventSource::Tail).await;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Transient failure reading log, retrying on next poll");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        // Hand the tailer back so a restarted controller resumes from
        // the same cursor.
        *self.tailer.lock().await = Some(tailer);
    }

    /// The single decision point: update presence, then drive the
    /// recorder on empty<->occupied transitions.
    async fn ingest(&self, event: ParticipantEvent, source: EventSource) {
        let mut state = self.state.lock().await;
        // A producer can still deliver for a moment after stop() flips
        // the flag; checked under the lock so a late event can never
        // restart the recorder against a cleared tracker.
        if !self.running.load(Ordering::SeqCst) {
            debug!(
                id = %event.participant_id,
                source = %source,
                "Dropping event delivered after shutdown"
            );
            return;
        }
        let exclusions = Arc::clone(&state.exclusions);
        let outcome = state.tracker.accept(&event, &exclusions);
        let count = state.tracker.len();

        match outcome {
            TransitionOutcome::NoChange => {
                if exclusions.is_excluded(&event.display_name, &event.participant_id) {
                    self.logger.log(&LogEvent::ParticipantExcluded {
                        kind: event.kind.to_string(),
                        display_name: event.display_name.clone(),
                        participant_id: event.participant_id.clone(),
                        source,
                    });
                } else {
                    debug!(
                        id = %event.participant_id,
                        kind = %event.kind,
                        "Redundant participant event ignored"
                    );
                }
            }
            TransitionOutcome::BecameNonEmpty => {
                self.log_membership(&event, count, source);
                if state.recording == RecordingState::Idle {
                    self.try_start_recording(&mut state).await;
                }
            }
            TransitionOutcome::BecameEmpty => {
                self.log_membership(&event, count, source);
                if state.recording == RecordingState::Recording {
                    self.try_stop_recording(&mut state).await;
                }
            }
            TransitionOutcome::Unchanged => {
                self.log_membership(&event, count, source);
            }
        }
    }

    fn log_membership(&self, event: &ParticipantEvent, count: usize, source: EventSource) {
        let log_event = match event.kind {
            EventKind::Joined => LogEvent::ParticipantJoined {
                display_name: event.display_name.clone(),
                participant_id: event.participant_id.clone(),
                count,
                source,
            },
            EventKind::Left => LogEvent::ParticipantLeft {
                display_name: event.display_name.clone(),
                participant_id: event.participant_id.clone(),
                count,
                source,
            },
        };
        self.logger.log(&log_event);
    }

    /// On failure the state stays Idle and no automatic retry happens;
    /// the next 0->1 transition re-attempts. Presence is still tracked
    /// throughout, so the gap is bounded and visible in the logs.
    async fn try_start_recording(&self, state: &mut Shared) {
        match self.driver.start_recording().await {
            Ok(outcome) => {
                if outcome == StartOutcome::AlreadyActive {
                    debug!("Backend was already recording");
                }
                state.recording = RecordingState::Recording;
                state.transition_seq += 1;
                let output_path = self.driver.output_path().await;
                self.logger.log(&LogEvent::RecordingStarted {
                    transition_seq: state.transition_seq,
                    output_path,
                });
            }
            Err(e) => {
                if connection_lost(&e) {
                    state.connected = false;
                }
                self.logger.log(&LogEvent::DriverCallFailed {
                    op: "start_recording".to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// On failure the state stays Recording so a later stop attempt is
    /// still possible.
    async fn try_stop_recording(&self, state: &mut Shared) {
        match self.driver.stop_recording().await {
            Ok(_) => {
                state.recording = RecordingState::Idle;
                state.transition_seq += 1;
                let output_path = self.driver.output_path().await;
                self.logger.log(&LogEvent::RecordingStopped {
                    transition_seq: state.transition_seq,
                    output_path,
                });
            }
            Err(e) => {
                if connection_lost(&e) {
                    state.connected = false;
                }
                self.logger.log(&LogEvent::DriverCallFailed {
                    op: "stop_recording".to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

fn connection_lost(error: &DriverError) -> bool {
    matches!(
        error,
        DriverError::Unreachable(_)
            | DriverError::NotConnected
            | DriverError::Timeout(_)
            | DriverError::AuthFailed
    )
}

#[async_trait]
impl<D: RecordingDriver + 'static> ParticipantSink for SessionController<D> {
    async fn participant_joined(
        &self,
        display_name: &str,
        participant_id: &str,
        source: EventSource,
    ) {
        if participant_id.is_empty() {
            warn!(source = %source, "Ignoring joined event with empty participant id");
            return;
        }
        self.ingest(ParticipantEvent::joined(display_name, participant_id), source)
            .await;
    }

    async fn participant_left(
        &self,
        display_name: &str,
        participant_id: &str,
        source: EventSource,
    ) {
        if participant_id.is_empty() {
            warn!(source = %source, "Ignoring left event with empty participant id");
            return;
        }
        self.ingest(ParticipantEvent::left(display_name, participant_id), source)
            .await;
    }
}
