//! # roomrec-tail
//!
//! Incremental tailing of the watched application's output log and
//! extraction of participant joined/left events from its lines.
//!
//! The tailer only ever reads bytes appended since the previous poll,
//! detects rotation/truncation by watching the file size, and tolerates
//! invalid UTF-8. The parser is a pure function from one log line to an
//! optional [`ParticipantEvent`].

pub mod parser;
pub mod tailer;

pub use parser::{parse_line, EventKind, ParticipantEvent};
pub use tailer::{discover_log_path, LogTailer, TailError, TailPoll};
