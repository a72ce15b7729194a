//! Conversation state types

use crate::action::ActionContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Persisted record of where a single conversation stands.
///
/// Flows are referenced by name only; the controller resolves the name
/// through its schema every time the state is used.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// `None` means the root flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) active_flow: Option<String>,
    #[serde(default)]
    pub(crate) position: usize,
    #[serde(default)]
    pub(crate) flow_context: FlowContext,
    #[serde(default)]
    pub(crate) interaction_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub(crate) question: QuestionState,
    #[serde(default)]
    pub(crate) is_complete: bool,
}

impl ConversationState {
    /// State for a conversation with no persisted record
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_flow(&self) -> Option<&str> {
        self.active_flow.as_deref()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn flow_context(&self) -> &FlowContext {
        &self.flow_context
    }

    pub fn interaction_history(&self) -> &[HistoryEntry] {
        &self.interaction_history
    }

    pub fn question(&self) -> &QuestionState {
        &self.question
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// True when the conversation is parked on a question waiting for an answer
    pub fn is_awaiting_answer(&self) -> bool {
        !self.is_complete && self.question.is_answering
    }
}

/// Question sub-state carried between inbound messages
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionState {
    /// Raw inbound bodies offered as answers, oldest first
    #[serde(default)]
    pub attempts: Vec<String>,
    #[serde(default)]
    pub is_answering: bool,
}

/// Last recorded snapshot per step name, scoped to one flow activation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowContext(BTreeMap<String, ActionContext>);

impl FlowContext {
    pub fn get(&self, step: &str) -> Option<&ActionContext> {
        self.0.get(step)
    }

    /// Answer recorded by the question at `step`, if it was answered
    pub fn answer(&self, step: &str) -> Option<&Value> {
        self.get(step).and_then(ActionContext::answer)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionContext)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, step: String, context: ActionContext) {
        self.0.insert(step, context);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// One appended entry of the interaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub flow: String,
    pub action: String,
    pub context: ActionContext,
}
