//! Mock implementations for testing
//!
//! These mocks enable runtime tests without a real gateway or database.

use super::traits::*;
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

// ============================================================================
// Mock Senders
// ============================================================================

/// Sender that records every message and issues sequential receipts
/// (`SM1`, `SM2`, ...)
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(Outbound, Instant)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().iter().map(|(o, _)| o.clone()).collect()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent().into_iter().map(|o| o.body).collect()
    }

    pub fn sent_to(&self, to: &str) -> Vec<Outbound> {
        self.sent().into_iter().filter(|o| o.to == to).collect()
    }

    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, outbound: &Outbound) -> Result<Option<String>, String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((outbound.clone(), Instant::now()));
        Ok(Some(format!("SM{}", sent.len())))
    }
}

/// Sender that succeeds a fixed number of times, then fails every send
pub struct FailingSender {
    remaining: AtomicUsize,
}

impl FailingSender {
    pub fn after(successes: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(successes),
        }
    }
}

#[async_trait]
impl MessageSender for FailingSender {
    async fn send(&self, _outbound: &Outbound) -> Result<Option<String>, String> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err("gateway returned 503".to_string());
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        Ok(None)
    }
}

// ============================================================================
// Mock Stores
// ============================================================================

/// Store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl StateStore for FailingStore {
    async fn load_state(&self, _conv_id: &str) -> Result<Option<ConversationState>, String> {
        Err("store offline".to_string())
    }

    async fn save_state(&self, _conv_id: &str, _state: &ConversationState) -> Result<(), String> {
        Err("store offline".to_string())
    }

    async fn discard_state(&self, _conv_id: &str) -> Result<(), String> {
        Err("store offline".to_string())
    }
}
