//! Inbound events arriving from the transport

use serde::{Deserialize, Serialize};

/// One message received from the other party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub body: String,
    /// Identifies the conversation (phone number, chat id, ...)
    pub sender: String,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            sender: sender.into(),
        }
    }
}
