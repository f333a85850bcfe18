// Engine configuration
//
// EngineConfig is a plain struct with defaults and builder-style setters.
// It carries behavior knobs only; credentials and endpoints belong to the
// capability and storage implementations.

use chrono::Duration;

/// Configuration for the intent engine and slot-filling sessions
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Conversation history entries kept per conversation (oldest dropped first)
    pub history_window: usize,

    /// End time applied when a completed draft has none (end = start + this)
    pub default_event_duration: Duration,

    /// Interval assigned to stored events with no end time during conflict
    /// detection; None treats them as zero-duration points
    pub open_event_duration: Option<Duration>,

    /// Minimum match confidence before an update/delete mutates anything
    pub match_confidence_threshold: f32,

    /// Minimum classification confidence for a different-family intent to
    /// take a turn away from an active slot-filling session
    pub takeover_confidence: f32,

    /// Consecutive turns without forward progress before a session is abandoned
    pub max_stalled_turns: u32,

    /// Idle time after which a session is abandoned
    pub session_idle_timeout: Duration,

    /// Idle time after which a conversation (history included) is evicted
    /// from memory; should be at least `session_idle_timeout`
    pub conversation_idle_timeout: Duration,

    /// Bound on every language-capability call; elapsed maps to
    /// CapabilityUnavailable
    pub capability_timeout: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            default_event_duration: Duration::hours(1),
            open_event_duration: None,
            match_confidence_threshold: 0.6,
            takeover_confidence: 0.8,
            max_stalled_turns: 3,
            session_idle_timeout: Duration::minutes(30),
            conversation_idle_timeout: Duration::hours(2),
            capability_timeout: std::time::Duration::from_secs(20),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the history window size
    pub fn with_history_window(mut self, entries: usize) -> Self {
        self.history_window = entries;
        self
    }

    /// Set the default event duration
    pub fn with_default_event_duration(mut self, duration: Duration) -> Self {
        self.default_event_duration = duration;
        self
    }

    /// Assign a nominal span to open-ended events during conflict detection
    pub fn with_open_event_duration(mut self, duration: Duration) -> Self {
        self.open_event_duration = Some(duration);
        self
    }

    /// Set the match confidence threshold
    pub fn with_match_confidence_threshold(mut self, threshold: f32) -> Self {
        self.match_confidence_threshold = threshold;
        self
    }

    /// Set the session takeover confidence
    pub fn with_takeover_confidence(mut self, confidence: f32) -> Self {
        self.takeover_confidence = confidence;
        self
    }

    /// Set the stalled-turn limit
    pub fn with_max_stalled_turns(mut self, turns: u32) -> Self {
        self.max_stalled_turns = turns;
        self
    }

    /// Set the session idle timeout
    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    /// Set the conversation eviction timeout
    pub fn with_conversation_idle_timeout(mut self, timeout: Duration) -> Self {
        self.conversation_idle_timeout = timeout;
        self
    }

    /// Set the capability call timeout
    pub fn with_capability_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.capability_timeout = timeout;
        self
    }
}
