//! Database schema and row types

use crate::state_machine::ConversationState;
use chrono::{DateTime, Utc};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversation_states (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversation_states_updated ON conversation_states(updated_at DESC);
";

/// One persisted conversation
#[derive(Debug, Clone)]
pub struct StoredConversation {
    pub id: String,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
