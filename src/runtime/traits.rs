//! Trait abstractions for runtime I/O
//!
//! The runtime never touches a transport or database directly; these traits
//! are the seams, and `testing` provides mock implementations.

use crate::action::OutboundKind;
use crate::db::Database;
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One message handed to the delivery gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Recipient; the sender of the inbound message
    pub to: String,
    pub kind: OutboundKind,
    pub body: String,
    /// Step that produced the message
    pub action: String,
}

/// Storage for conversation state, keyed by conversation id
#[async_trait]
pub trait StateStore: Send + Sync {
    /// `None` when the conversation has no persisted record
    async fn load_state(&self, conv_id: &str) -> Result<Option<ConversationState>, String>;

    async fn save_state(&self, conv_id: &str, state: &ConversationState) -> Result<(), String>;

    /// Drop the record of a finished conversation
    async fn discard_state(&self, conv_id: &str) -> Result<(), String>;
}

/// Delivery gateway for outbound messages
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver one message; returns the gateway's receipt id if it issues one
    async fn send(&self, outbound: &Outbound) -> Result<Option<String>, String>;
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a `StateStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl StateStore for DatabaseStorage {
    async fn load_state(&self, conv_id: &str) -> Result<Option<ConversationState>, String> {
        self.db.get_state(conv_id).map_err(|e| e.to_string())
    }

    async fn save_state(&self, conv_id: &str, state: &ConversationState) -> Result<(), String> {
        self.db.save_state(conv_id, state).map_err(|e| e.to_string())
    }

    async fn discard_state(&self, conv_id: &str) -> Result<(), String> {
        self.db.delete_state(conv_id).map_err(|e| e.to_string())
    }
}

/// Process-local store; state is lost on restart
#[derive(Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load_state(&self, conv_id: &str) -> Result<Option<ConversationState>, String> {
        Ok(self.states.read().await.get(conv_id).cloned())
    }

    async fn save_state(&self, conv_id: &str, state: &ConversationState) -> Result<(), String> {
        self.states
            .write()
            .await
            .insert(conv_id.to_string(), state.clone());
        Ok(())
    }

    async fn discard_state(&self, conv_id: &str) -> Result<(), String> {
        self.states.write().await.remove(conv_id);
        Ok(())
    }
}
