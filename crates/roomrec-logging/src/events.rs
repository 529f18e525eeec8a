use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which producer delivered a participant event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Tail,
    Osc,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::Tail => write!(f, "tail"),
            EventSource::Osc => write!(f, "osc"),
        }
    }
}

/// Structured log events for the presence monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    MonitorStarted {
        log_path: Option<PathBuf>,
        poll_interval_ms: u64,
        osc_enabled: bool,
    },
    BackendConnected {
        backend: String,
        version: Option<String>,
    },
    BackendDisconnected,
    ParticipantJoined {
        display_name: String,
        participant_id: String,
        count: usize,
        source: EventSource,
    },
    ParticipantLeft {
        display_name: String,
        participant_id: String,
        count: usize,
        source: EventSource,
    },
    /// An event from an excluded participant was observed but did not
    /// affect the presence count
    ParticipantExcluded {
        kind: String,
        display_name: String,
        participant_id: String,
        source: EventSource,
    },
    RecordingStarted {
        transition_seq: u64,
        output_path: Option<String>,
    },
    RecordingStopped {
        transition_seq: u64,
        output_path: Option<String>,
    },
    DriverCallFailed {
        op: String,
        error: String,
    },
    LogRotated {
        path: PathBuf,
    },
    ExclusionsReloaded {
        names: usize,
        ids: usize,
    },
    MonitorStopped {
        transitions: u64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Structured event logger writing to stderr and optionally a file
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON lines regardless of console format
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::MonitorStarted {
                log_path,
                poll_interval_ms,
                osc_enabled,
            } => {
                let path_text = log_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not found yet)".to_string());
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {}",
                    "roomrec".bold().bright_white(),
                    "presence monitor".dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "Watching:".dimmed(),
                    path_text.bright_white()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {}ms{}",
                    "Poll interval:".dimmed(),
                    poll_interval_ms,
                    if *osc_enabled {
                        ", OSC listener enabled".dimmed().to_string()
                    } else {
                        String::new()
                    }
                );
                let _ = writeln!(stderr);
            }
            LogEvent::BackendConnected { backend, version } => {
                let version_text = version
                    .as_ref()
                    .map(|v| format!(" ({})", v))
                    .unwrap_or_default();
                let _ = writeln!(
                    stderr,
                    "{} Connected to recorder backend {}{}",
                    "✓".bright_green(),
                    backend,
                    version_text.dimmed()
                );
            }
            LogEvent::BackendDisconnected => {
                let _ = writeln!(stderr, "{} Disconnected from recorder", "·".dimmed());
            }
            LogEvent::ParticipantJoined {
                display_name,
                participant_id,
                count,
                source,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} {} joined {} {}",
                    "→".bright_green(),
                    display_name.bold(),
                    format!("({})", participant_id).dimmed(),
                    format!("[{} present, via {}]", count, source).dimmed()
                );
            }
            LogEvent::ParticipantLeft {
                display_name,
                participant_id,
                count,
                source,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} {} left {} {}",
                    "←".bright_yellow(),
                    display_name.bold(),
                    format!("({})", participant_id).dimmed(),
                    format!("[{} present, via {}]", count, source).dimmed()
                );
            }
            LogEvent::ParticipantExcluded {
                kind,
                display_name,
                participant_id,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{} excluded participant {} {} ({})",
                    "∅".dimmed(),
                    display_name.dimmed(),
                    kind.dimmed(),
                    participant_id.dimmed()
                );
            }
            LogEvent::RecordingStarted {
                transition_seq,
                output_path,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "●".bright_red(),
                    "Recording started".bright_red().bold(),
                    format!("[seq {}]", transition_seq).dimmed()
                );
                if let Some(path) = output_path {
                    let _ = writeln!(stderr, "    {} {}", "File:".dimmed(), path);
                }
            }
            LogEvent::RecordingStopped {
                transition_seq,
                output_path,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "■".bright_white(),
                    "Recording stopped".bold(),
                    format!("[seq {}]", transition_seq).dimmed()
                );
                if let Some(path) = output_path {
                    let _ = writeln!(stderr, "    {} {}", "File:".dimmed(), path);
                }
            }
            LogEvent::DriverCallFailed { op, error } => {
                let _ = writeln!(
                    stderr,
                    "{} Recorder call {} failed: {}",
                    "✗".bright_red(),
                    op,
                    error.bright_red()
                );
            }
            LogEvent::LogRotated { path } => {
                let _ = writeln!(
                    stderr,
                    "{} Log file rotated, rereading from start: {}",
                    "⟳".bright_yellow(),
                    path.display()
                );
            }
            LogEvent::ExclusionsReloaded { names, ids } => {
                let _ = writeln!(
                    stderr,
                    "{} Exclusions reloaded ({} names, {} ids)",
                    "·".dimmed(),
                    names,
                    ids
                );
            }
            LogEvent::MonitorStopped { transitions } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Monitor stopped after {} recording transition(s)",
                    "·".dimmed(),
                    transitions
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::MonitorStarted { .. } => format!("[{}] monitor:start", timestamp),
            LogEvent::BackendConnected { backend, .. } => {
                format!("[{}] backend:connect {}", timestamp, backend)
            }
            LogEvent::BackendDisconnected => format!("[{}] backend:disconnect", timestamp),
            LogEvent::ParticipantJoined {
                participant_id,
                count,
                ..
            } => format!("[{}] join:{} n={}", timestamp, participant_id, count),
            LogEvent::ParticipantLeft {
                participant_id,
                count,
                ..
            } => format!("[{}] leave:{} n={}", timestamp, participant_id, count),
            LogEvent::ParticipantExcluded {
                kind,
                participant_id,
                ..
            } => format!("[{}] excluded:{}:{}", timestamp, kind, participant_id),
            LogEvent::RecordingStarted { transition_seq, .. } => {
                format!("[{}] rec:start seq={}", timestamp, transition_seq)
            }
            LogEvent::RecordingStopped { transition_seq, .. } => {
                format!("[{}] rec:stop seq={}", timestamp, transition_seq)
            }
            LogEvent::DriverCallFailed { op, error } => {
                format!("[{}] driver:fail:{} {}", timestamp, op, error)
            }
            LogEvent::LogRotated { .. } => format!("[{}] tail:rotated", timestamp),
            LogEvent::ExclusionsReloaded { names, ids } => {
                format!("[{}] exclude:reload n={} i={}", timestamp, names, ids)
            }
            LogEvent::MonitorStopped { transitions } => {
                format!("[{}] monitor:stop seq={}", timestamp, transitions)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}
