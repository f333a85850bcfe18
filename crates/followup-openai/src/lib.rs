// OpenAI Capability Implementation
//
// This crate provides an OpenAI-backed implementation of the
// LanguageCapability trait from followup-core. All prompt text lives here;
// the engine never sees provider-specific wording or wire formats.

mod capability;
mod prompts;
mod types;

pub use capability::OpenAiCapability;
pub use types::{ChatMessage, ChatRequest, ChatResponse, ContentPart, MessageContent};
