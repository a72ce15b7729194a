//! Flat token encoding of conversation state
//!
//! Produces the opaque string an external layer can stash in a cookie or
//! header. Signing and encryption are that layer's concern; this only
//! guarantees a lossless round trip.

use super::state::ConversationState;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Token does not hold a conversation state: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConversationState {
    pub fn to_token(&self) -> Result<String, TokenError> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn from_token(token: &str) -> Result<Self, TokenError> {
        let json = URL_SAFE_NO_PAD.decode(token.trim())?;
        Ok(serde_json::from_slice(&json)?)
    }
}
