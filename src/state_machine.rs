//! Conversation state machine
//!
//! Persisted conversation state plus the pure transition applied after each
//! resolved action.

pub mod event;
pub mod state;
pub(crate) mod token;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use event::InboundMessage;
pub use state::{ConversationState, FlowContext, HistoryEntry, QuestionState};
pub use token::TokenError;
pub use transition::next_state;
