use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Whether a participant arrived or departed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Joined,
    Left,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Joined => write!(f, "joined"),
            EventKind::Left => write!(f, "left"),
        }
    }
}

/// A single participant arrival or departure extracted from a log line
/// (or delivered by the OSC listener).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantEvent {
    pub kind: EventKind,
    /// Human-readable name; may be empty when the producer only knows the id.
    pub display_name: String,
    /// Stable identifier; never empty.
    pub participant_id: String,
}

impl ParticipantEvent {
    pub fn joined(display_name: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Joined,
            display_name: display_name.into(),
            participant_id: participant_id.into(),
        }
    }

    pub fn left(display_name: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Left,
            display_name: display_name.into(),
            participant_id: participant_id.into(),
        }
    }
}

lazy_static! {
    // Structured form: bracketed timestamp prefix as the log writer emits it
    static ref JOINED: Regex = Regex::new(
        r"(?i)\[.*?\]\s+.*?OnPlayerJoined\s+.*?displayName=([^\s,]+).*?id=([^\s,)]+)"
    )
    .unwrap();
    static ref LEFT: Regex = Regex::new(
        r"(?i)\[.*?\]\s+.*?OnPlayerLeft\s+.*?displayName=([^\s,]+).*?id=([^\s,)]+)"
    )
    .unwrap();
    // Looser fallback form, tolerant of missing prefix and `key: value` spelling
    static ref JOINED_LOOSE: Regex = Regex::new(
        r"(?i)OnPlayerJoined.*?displayName[=:]\s*([^\s,]+).*?id[=:]\s*([^\s,)]+)"
    )
    .unwrap();
    static ref LEFT_LOOSE: Regex = Regex::new(
        r"(?i)OnPlayerLeft.*?displayName[=:]\s*([^\s,]+).*?id[=:]\s*([^\s,)]+)"
    )
    .unwrap();
}

/// Extract a participant event from one log line.
///
/// The structured grammar is tried before the loose fallback, and the
/// Joined patterns before the Left patterns, so a line that could
/// structurally match both yields a Joined event. Most lines are
/// unrelated and yield `None`; that is not an error.
pub fn parse_line(line: &str) -> Option<ParticipantEvent> {
    if let Some(caps) = JOINED.captures(line).or_else(|| JOINED_LOOSE.captures(line)) {
        return Some(ParticipantEvent::joined(
            caps[1].trim(),
            caps[2].trim(),
        ));
    }

    if let Some(caps) = LEFT.captures(line).or_else(|| LEFT_LOOSE.captures(line)) {
        return Some(ParticipantEvent::left(caps[1].trim(), caps[2].trim()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_joined_line() {
        let line =
            "[2026.08.12 03:14:07] Behaviour OnPlayerJoined displayName=Alice id=usr_a1b2c3";
        let event = parse_line(line).unwrap();
        assert_eq!(event.kind, EventKind::Joined);
        assert_eq!(event.display_name, "Alice");
        assert_eq!(event.participant_id, "usr_a1b2c3");
    }

    #[test]
    fn test_structured_left_line() {
        let line = "[2026.08.12 04:02:55] Behaviour OnPlayerLeft displayName=Bob id=usr_d4e5f6";
        let event = parse_line(line).unwrap();
        assert_eq!(event.kind, EventKind::Left);
        assert_eq!(event.display_name, "Bob");
        assert_eq!(event.participant_id, "usr_d4e5f6");
    }

    #[test]
    fn test_loose_fallback_with_colons() {
        let line = "OnPlayerJoined displayName: Carol id: usr_777";
        let event = parse_line(line).unwrap();
        assert_eq!(event.kind, EventKind::Joined);
        assert_eq!(event.display_name, "Carol");
        assert_eq!(event.participant_id, "usr_777");
    }

    #[test]
    fn test_case_insensitive_match() {
        let line = "[x] onplayerleft displayName=dave id=usr_8";
        let event = parse_line(line).unwrap();
        assert_eq!(event.kind, EventKind::Left);
    }

    #[test]
    fn test_unrelated_line_yields_nothing() {
        assert_eq!(parse_line("random unrelated text"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("[2026.08.12] Shader warning: foo"), None);
    }

    // A line that could structurally match both grammars must resolve
    // as Joined, matching the pattern evaluation order.
    #[test]
    fn test_joined_takes_precedence_over_left() {
        let line = "OnPlayerLeft OnPlayerJoined displayName=Eve id=usr_9";
        let event = parse_line(line).unwrap();
        assert_eq!(event.kind, EventKind::Joined);
    }

    #[test]
    fn test_id_stops_at_closing_paren() {
        let line = "[x] y OnPlayerJoined (displayName=Frank id=usr_10)";
        let event = parse_line(line).unwrap();
        assert_eq!(event.participant_id, "usr_10");
    }

    #[test]
    fn test_name_stops_at_comma() {
        let line = "[x] y OnPlayerJoined displayName=Grace, id=usr_11";
        let event = parse_line(line).unwrap();
        assert_eq!(event.display_name, "Grace");
        assert_eq!(event.participant_id, "usr_11");
    }
}
