// Conversation turn and bounded history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::event::EventSource;

/// One inbound user message (plus optional image) within a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ConversationTurn {
    pub raw_text: String,
    /// Opaque reference to an uploaded image (URL or data reference);
    /// resolved by the capability implementation, never by the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a text-only turn stamped with the current time
    pub fn text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            image_ref: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach an image reference to this turn
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Provenance implied by this turn (image when one is attached)
    pub fn origin(&self) -> EventSource {
        if self.image_ref.is_some() {
            EventSource::Image
        } else {
            EventSource::Text
        }
    }
}

/// Who produced a history entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::User => write!(f, "User"),
            Speaker::Assistant => write!(f, "Assistant"),
        }
    }
}

/// One past exchange line in a conversation's history window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded conversation history, ordered oldest → newest
///
/// Older entries fall off the front once the window is full.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>, timestamp: DateTime<Utc>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            speaker,
            text: text.into(),
            timestamp,
        });
    }

    /// Entries oldest → newest as a slice-friendly Vec
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_window_drops_oldest() {
        let mut history = History::with_capacity(3);
        for i in 0..5 {
            history.push(Speaker::User, format!("m{i}"), Utc::now());
        }
        let entries = history.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "m2");
        assert_eq!(entries[2].text, "m4");
    }

    #[test]
    fn turn_origin_follows_image_presence() {
        assert_eq!(ConversationTurn::text("hi").origin(), EventSource::Text);
        assert_eq!(
            ConversationTurn::text("hi").with_image("ref-1").origin(),
            EventSource::Image
        );
    }
}
