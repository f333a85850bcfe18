// Slot-filling session state
//
// A SlotSession tracks one in-progress creation or update across turns:
// Collecting → {Searching, AwaitingClarification} → Collecting → committed
// or abandoned. The engine owns at most one session per user+conversation
// and discards it on commit or abandonment; a session never holds a
// reference to a committed event beyond its id.

use chrono::{DateTime, Duration, Utc};

use crate::capability::CreateExtraction;
use crate::event::{EventDraft, EventField, EventSource};

/// Why a session is not yet complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next extraction
    Collecting,
    /// A clarification question has been asked
    AwaitingClarification,
    /// A web-search action was emitted; its result re-enters as a new turn
    Searching,
}

/// What kind of mutation the session is building toward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Create,
    /// Update; target is set once a reference is resolved
    Update { target: Option<i64> },
}

/// Outcome of absorbing one extraction into the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// All required fields present; ready to validate and commit
    Complete,
    /// Delegate to the web-search collaborator with these keywords
    Search { keywords: Vec<String> },
    /// Ask the user for missing information
    Clarify { question: Option<String> },
    /// No forward progress for too many turns; abandon the session
    Stalled,
}

/// In-progress creation/update state for one conversation
#[derive(Debug, Clone)]
pub struct SlotSession {
    pub kind: SessionKind,
    pub state: SessionState,
    /// Fields collected so far; merged per field, last-write-wins
    pub collected: EventDraft,
    /// Required fields still missing, recomputed after every extraction
    pub missing: Vec<EventField>,
    /// Provenance of the turn that opened the session
    pub origin: EventSource,
    stalled_turns: u32,
    unrelated_streak: u32,
    last_activity: DateTime<Utc>,
}

impl SlotSession {
    /// Open a creation session
    pub fn create(origin: EventSource, now: DateTime<Utc>) -> Self {
        Self {
            kind: SessionKind::Create,
            state: SessionState::Collecting,
            collected: EventDraft::default(),
            missing: EventDraft::default().missing_required(),
            origin,
            stalled_turns: 0,
            unrelated_streak: 0,
            last_activity: now,
        }
    }

    /// Open an update session, with or without a resolved target
    pub fn update(target: Option<i64>, origin: EventSource, now: DateTime<Utc>) -> Self {
        Self {
            kind: SessionKind::Update { target },
            state: if target.is_some() {
                SessionState::Collecting
            } else {
                SessionState::AwaitingClarification
            },
            collected: EventDraft::default(),
            missing: Vec::new(),
            origin,
            stalled_turns: 0,
            unrelated_streak: 0,
            last_activity: now,
        }
    }

    /// Resolved update target, if any
    pub fn target(&self) -> Option<i64> {
        match self.kind {
            SessionKind::Update { target } => target,
            SessionKind::Create => None,
        }
    }

    /// Record a resolved update target
    pub fn set_target(&mut self, event_id: i64) {
        if let SessionKind::Update { target } = &mut self.kind {
            *target = Some(event_id);
            self.state = SessionState::Collecting;
        }
    }

    /// Merge one extraction into the collected fields and decide the next step
    ///
    /// Completion is recomputed from the merged draft, not taken from the
    /// extraction alone: fields supplied in earlier turns count. Forward
    /// progress means the merged draft gained at least one field; stalling
    /// `max_stalled` turns in a row abandons the session.
    pub fn absorb(
        &mut self,
        extraction: &CreateExtraction,
        now: DateTime<Utc>,
        max_stalled: u32,
    ) -> SessionStep {
        let before = self.collected.present_count();
        self.collected.merge_from(&extraction.fields);
        self.missing = self.collected.missing_required();
        self.last_activity = now;
        self.unrelated_streak = 0;

        if self.missing.is_empty() {
            self.stalled_turns = 0;
            return SessionStep::Complete;
        }

        if self.collected.present_count() > before {
            self.stalled_turns = 0;
        } else {
            self.stalled_turns += 1;
            if self.stalled_turns >= max_stalled {
                return SessionStep::Stalled;
            }
        }

        if !extraction.search_keywords.is_empty() {
            self.state = SessionState::Searching;
            return SessionStep::Search {
                keywords: extraction.search_keywords.clone(),
            };
        }

        self.state = SessionState::AwaitingClarification;
        SessionStep::Clarify {
            question: extraction.clarification_question.clone(),
        }
    }

    /// Record that the classifier routed this turn elsewhere
    ///
    /// Returns true when the session should be abandoned (two unrelated
    /// turns in a row).
    pub fn note_unrelated(&mut self, now: DateTime<Utc>) -> bool {
        self.last_activity = now;
        self.unrelated_streak += 1;
        self.unrelated_streak >= 2
    }

    /// Record a turn that stayed with the session
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.unrelated_streak = 0;
    }

    /// True when the session has been idle past the timeout
    pub fn expired(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now - self.last_activity > idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, h, 0, 0).unwrap()
    }

    fn extraction(fields: EventDraft) -> CreateExtraction {
        CreateExtraction {
            complete: fields.missing_required().is_empty(),
            fields,
            ..Default::default()
        }
    }

    #[test]
    fn disjoint_fields_across_turns_match_single_turn() {
        let mut across_turns = SlotSession::create(EventSource::Text, ts(9));
        across_turns.absorb(
            &extraction(EventDraft {
                title: Some("Dinner".into()),
                ..Default::default()
            }),
            ts(9),
            3,
        );
        let step = across_turns.absorb(
            &extraction(EventDraft {
                start_time: Some(ts(19)),
                ..Default::default()
            }),
            ts(9),
            3,
        );
        assert_eq!(step, SessionStep::Complete);

        let mut at_once = SlotSession::create(EventSource::Text, ts(9));
        let step = at_once.absorb(
            &extraction(EventDraft {
                title: Some("Dinner".into()),
                start_time: Some(ts(19)),
                ..Default::default()
            }),
            ts(9),
            3,
        );
        assert_eq!(step, SessionStep::Complete);
        assert_eq!(across_turns.collected, at_once.collected);
    }

    #[test]
    fn incomplete_extraction_asks_for_clarification() {
        let mut session = SlotSession::create(EventSource::Text, ts(9));
        let step = session.absorb(
            &CreateExtraction {
                fields: EventDraft {
                    title: Some("Meeting".into()),
                    ..Default::default()
                },
                clarification_question: Some("What time is the meeting?".into()),
                ..Default::default()
            },
            ts(9),
            3,
        );
        assert_eq!(
            step,
            SessionStep::Clarify {
                question: Some("What time is the meeting?".into())
            }
        );
        assert_eq!(session.state, SessionState::AwaitingClarification);
        assert_eq!(session.missing, vec![EventField::StartTime]);
    }

    #[test]
    fn search_keywords_take_priority_over_clarification() {
        let mut session = SlotSession::create(EventSource::Text, ts(9));
        let step = session.absorb(
            &CreateExtraction {
                fields: EventDraft {
                    title: Some("Philharmonic concert".into()),
                    ..Default::default()
                },
                clarification_question: Some("When is it?".into()),
                search_keywords: vec!["philharmonic".into(), "concert".into(), "2026".into()],
                ..Default::default()
            },
            ts(9),
            3,
        );
        assert!(matches!(step, SessionStep::Search { .. }));
        assert_eq!(session.state, SessionState::Searching);
    }

    #[test]
    fn no_progress_turns_eventually_stall() {
        let mut session = SlotSession::create(EventSource::Text, ts(9));
        session.absorb(
            &extraction(EventDraft {
                title: Some("Meeting".into()),
                ..Default::default()
            }),
            ts(9),
            2,
        );

        let empty = extraction(EventDraft::default());
        assert!(matches!(
            session.absorb(&empty, ts(9), 2),
            SessionStep::Clarify { .. }
        ));
        assert_eq!(session.absorb(&empty, ts(9), 2), SessionStep::Stalled);
    }

    #[test]
    fn unrelated_streak_abandons_after_two() {
        let mut session = SlotSession::create(EventSource::Text, ts(9));
        assert!(!session.note_unrelated(ts(9)));
        assert!(session.note_unrelated(ts(9)));
    }

    #[test]
    fn idle_sessions_expire() {
        let session = SlotSession::create(EventSource::Text, ts(9));
        assert!(!session.expired(ts(9) + Duration::minutes(10), Duration::minutes(30)));
        assert!(session.expired(ts(9) + Duration::minutes(31), Duration::minutes(30)));
    }
}
