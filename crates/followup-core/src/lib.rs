// FollowUp conversation engine
//
// A deterministic intent-resolution and slot-filling engine for a calendar
// assistant. The language model sits behind a typed capability port, so the
// control flow (state machine, routing, conflict checks) stays testable
// independent of model behavior.
//
// Key design decisions:
// - Uses traits (EventStore, LanguageCapability) for pluggable backends
// - Event ids are per-user sequence numbers, never reused after deletion
// - Per-conversation turns are serialized; conversations run in parallel
// - Every capability call carries a bounded timeout; failures degrade to a
//   chat-style reply instead of propagating
// - Recurrence fields are stored opaquely, never expanded into instances

pub mod capability;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod event;
pub mod session;
pub mod timeframe;
pub mod traits;
pub mod turn;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use capability::{CreateExtraction, EventMatch, Intent, IntentClassification};
pub use config::EngineConfig;
pub use conflict::{find_overlaps, intervals_overlap, Interval};
pub use engine::{EngineAction, IntentEngine, TurnOutcome};
pub use error::{EngineError, Result};
pub use event::{Event, EventDraft, EventField, EventPatch, EventSource, NewEvent};
pub use memory::{InMemoryEventStore, ScriptedCapability};
pub use session::{SessionKind, SessionState, SessionStep, SlotSession};
pub use timeframe::{infer_time_range, TimeRange};
pub use traits::{EventStore, LanguageCapability};
pub use turn::{ConversationTurn, History, HistoryEntry, Speaker};
