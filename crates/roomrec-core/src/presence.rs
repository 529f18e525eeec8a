use std::collections::{HashMap, HashSet};

use serde::Serialize;

use roomrec_tail::{EventKind, ParticipantEvent};

/// Participants whose events never affect the presence count.
///
/// Name entries match case-insensitively as substrings of the display
/// name; id entries match exactly. Empty entries are dropped at
/// construction so they can never accidentally match everything.
/// Replaced wholesale on reload, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    name_substrings: Vec<String>,
    ids: HashSet<String>,
}

impl ExclusionSet {
    pub fn new(
        names: impl IntoIterator<Item = String>,
        ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name_substrings: names
                .into_iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
            ids: ids
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
        }
    }

    pub fn name_count(&self) -> usize {
        self.name_substrings.len()
    }

    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    /// Name-substring match is checked before the id match; either is
    /// sufficient.
    pub fn is_excluded(&self, display_name: &str, participant_id: &str) -> bool {
        if !display_name.is_empty() {
            let lowered = display_name.to_lowercase();
            if self
                .name_substrings
                .iter()
                .any(|needle| lowered.contains(needle))
            {
                return true;
            }
        }
        self.ids.contains(participant_id)
    }
}

/// How an accepted event moved the presence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Event was excluded or redundant; the set is untouched.
    NoChange,
    /// First participant arrived (0 -> 1).
    BecameNonEmpty,
    /// Last participant departed (1 -> 0).
    BecameEmpty,
    /// Membership changed without crossing the empty boundary.
    Unchanged,
}

/// A currently-present participant, for status snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub participant_id: String,
    pub display_name: String,
}

/// Pure state machine over the set of present, non-excluded
/// participants.
///
/// A participant id is present iff it was marked joined, has not yet
/// left, and was not excluded when its join was evaluated.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    present: HashMap<String, String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    pub fn contains(&self, participant_id: &str) -> bool {
        self.present.contains_key(participant_id)
    }

    /// Snapshot of present participants, sorted by id for stable output.
    pub fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self
            .present
            .iter()
            .map(|(id, name)| Participant {
                participant_id: id.clone(),
                display_name: name.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        list
    }

    pub fn clear(&mut self) {
        self.present.clear();
    }

    /// Apply one event against the given exclusion snapshot.
    ///
    /// Re-joining while present and leaving while absent are no-ops,
    /// not errors: the log stream can replay either under rotation.
    pub fn accept(
        &mut self,
        event: &ParticipantEvent,
        exclusions: &ExclusionSet,
    ) -> TransitionOutcome {
        if exclusions.is_excluded(&event.display_name, &event.participant_id) {
            return TransitionOutcome::NoChange;
        }

        match event.kind {
            EventKind::Joined => {
                if self.present.contains_key(&event.participant_id) {
                    return TransitionOutcome::NoChange;
                }
                self.present
                    .insert(event.participant_id.clone(), event.display_name.clone());
                if self.present.len() == 1 {
                    TransitionOutcome::BecameNonEmpty
                } else {
                    TransitionOutcome::Unchanged
                }
            }
            EventKind::Left => {
                if self.present.remove(&event.participant_id).is_none() {
                    return TransitionOutcome::NoChange;
                }
                if self.present.is_empty() {
                    TransitionOutcome::BecameEmpty
                } else {
                    TransitionOutcome::Unchanged
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomrec_tail::ParticipantEvent;

    fn no_exclusions() -> ExclusionSet {
        ExclusionSet::default()
    }

    #[test]
    fn test_alice_bob_scenario_transitions() {
        let mut tracker = PresenceTracker::new();
        let ex = no_exclusions();

        let outcomes = [
            tracker.accept(&ParticipantEvent::joined("Alice", "u1"), &ex),
            tracker.accept(&ParticipantEvent::joined("Bob", "u2"), &ex),
            tracker.accept(&ParticipantEvent::left("Alice", "u1"), &ex),
            tracker.accept(&ParticipantEvent::left("Bob", "u2"), &ex),
        ];

        assert_eq!(
            outcomes,
            [
                TransitionOutcome::BecameNonEmpty,
                TransitionOutcome::Unchanged,
                TransitionOutcome::Unchanged,
                TransitionOutcome::BecameEmpty,
            ]
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_rejoin_is_a_noop() {
        let mut tracker = PresenceTracker::new();
        let ex = no_exclusions();

        tracker.accept(&ParticipantEvent::joined("Alice", "u1"), &ex);
        let second = tracker.accept(&ParticipantEvent::joined("Alice", "u1"), &ex);

        assert_eq!(second, TransitionOutcome::NoChange);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_leave_of_absent_id_never_goes_negative() {
        let mut tracker = PresenceTracker::new();
        let ex = no_exclusions();

        assert_eq!(
            tracker.accept(&ParticipantEvent::left("Ghost", "u404"), &ex),
            TransitionOutcome::NoChange
        );
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_count_equals_net_joins() {
        let mut tracker = PresenceTracker::new();
        let ex = no_exclusions();

        for i in 0..5 {
            tracker.accept(
                &ParticipantEvent::joined(format!("P{}", i), format!("u{}", i)),
                &ex,
            );
        }
        tracker.accept(&ParticipantEvent::left("P1", "u1"), &ex);
        tracker.accept(&ParticipantEvent::left("P3", "u3"), &ex);

        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_excluded_name_substring_never_enters_set() {
        let mut tracker = PresenceTracker::new();
        let ex = ExclusionSet::new(vec!["bot".to_string()], vec![]);

        let outcome = tracker.accept(&ParticipantEvent::joined("SpamBot42", "u9"), &ex);

        assert_eq!(outcome, TransitionOutcome::NoChange);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_excluded_id_exact_match() {
        let mut tracker = PresenceTracker::new();
        let ex = ExclusionSet::new(vec![], vec!["usr_mirror".to_string()]);

        assert_eq!(
            tracker.accept(&ParticipantEvent::joined("Innocuous", "usr_mirror"), &ex),
            TransitionOutcome::NoChange
        );
        // Prefixes are not exact matches
        assert_eq!(
            tracker.accept(&ParticipantEvent::joined("Other", "usr_mirror2"), &ex),
            TransitionOutcome::BecameNonEmpty
        );
    }

    #[test]
    fn test_exclusion_is_case_insensitive_on_names() {
        let ex = ExclusionSet::new(vec!["CameraBot".to_string()], vec![]);
        assert!(ex.is_excluded("my camerabot v2", "u1"));
        assert!(ex.is_excluded("CAMERABOT", "u2"));
        assert!(!ex.is_excluded("camera", "u3"));
    }

    #[test]
    fn test_empty_exclusion_entries_never_match() {
        let ex = ExclusionSet::new(
            vec!["".to_string(), "   ".to_string()],
            vec!["".to_string()],
        );
        assert_eq!(ex.name_count(), 0);
        assert_eq!(ex.id_count(), 0);
        assert!(!ex.is_excluded("Anyone", "u1"));
        assert!(!ex.is_excluded("", ""));
    }

    #[test]
    fn test_empty_display_name_skips_name_check() {
        // OSC producers may only know the id
        let ex = ExclusionSet::new(vec!["bot".to_string()], vec!["u2".to_string()]);
        assert!(!ex.is_excluded("", "u1"));
        assert!(ex.is_excluded("", "u2"));
    }

    #[test]
    fn test_exclusion_invariant_regardless_of_order() {
        let mut tracker = PresenceTracker::new();
        let ex = ExclusionSet::new(vec!["bot".to_string()], vec![]);

        tracker.accept(&ParticipantEvent::joined("Alice", "u1"), &ex);
        tracker.accept(&ParticipantEvent::joined("SpamBot42", "u9"), &ex);
        tracker.accept(&ParticipantEvent::left("SpamBot42", "u9"), &ex);
        tracker.accept(&ParticipantEvent::joined("HelperBot", "u10"), &ex);

        assert_eq!(tracker.len(), 1);
        assert!(tracker.contains("u1"));
        assert!(!tracker.contains("u9"));
        assert!(!tracker.contains("u10"));
    }

    #[test]
    fn test_participants_snapshot_is_sorted() {
        let mut tracker = PresenceTracker::new();
        let ex = no_exclusions();
        tracker.accept(&ParticipantEvent::joined("Zed", "u2"), &ex);
        tracker.accept(&ParticipantEvent::joined("Amy", "u1"), &ex);

        let snapshot = tracker.participants();
        assert_eq!(snapshot[0].participant_id, "u1");
        assert_eq!(snapshot[1].participant_id, "u2");
        assert_eq!(snapshot[1].display_name, "Zed");
    }
}
