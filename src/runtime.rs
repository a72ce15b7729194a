//! Runtime for processing inbound messages
//!
//! Each conversation gets its own task and request queue, so two inbound
//! events for the same conversation are never processed against the same
//! loaded state. Different conversations proceed independently. A runtime
//! retires once its conversation completes and no requests are queued.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRuntime, PassOutcome};
pub use traits::*;

use crate::controller::FlowController;
use crate::error::RuntimeError;
use crate::state_machine::InboundMessage;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_STEPS: usize = 64;

const REQUEST_QUEUE_DEPTH: usize = 32;

/// Live runtimes keyed by conversation id
pub(crate) type RuntimeMap = RwLock<HashMap<String, ConversationHandle>>;

/// Per-pass limits applied by every conversation runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Minimum spacing between consecutive outbound sends
    pub send_interval: Duration,
    /// Upper bound on chained resolutions in one pass
    pub max_steps: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Request queued for a conversation runtime
#[derive(Debug)]
pub struct InboundRequest {
    pub message: InboundMessage,
    pub user_context: Value,
    pub reply: oneshot::Sender<Result<PassOutcome, RuntimeError>>,
}

/// Handle to a running conversation
pub struct ConversationHandle {
    pub request_tx: mpsc::Sender<InboundRequest>,
}

/// Manager for all conversation runtimes
pub struct ConversationManager<S, M>
where
    S: StateStore + ?Sized + 'static,
    M: MessageSender + ?Sized + 'static,
{
    controller: Arc<FlowController>,
    store: Arc<S>,
    sender: Arc<M>,
    settings: RuntimeSettings,
    runtimes: Arc<RuntimeMap>,
}

impl<S, M> ConversationManager<S, M>
where
    S: StateStore + ?Sized + 'static,
    M: MessageSender + ?Sized + 'static,
{
    pub fn new(controller: Arc<FlowController>, store: Arc<S>, sender: Arc<M>, settings: RuntimeSettings) -> Self {
        Self {
            controller,
            store,
            sender,
            settings,
            runtimes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn controller(&self) -> &Arc<FlowController> {
        &self.controller
    }

    /// Queue an inbound message behind any others from the same sender and
    /// wait for its pass to finish.
    pub async fn dispatch(&self, message: InboundMessage, user_context: Value) -> Result<PassOutcome, RuntimeError> {
        let (reply, reply_rx) = oneshot::channel();
        let mut request = InboundRequest {
            message,
            user_context,
            reply,
        };
        loop {
            let request_tx = self.get_or_create(&request.message.sender).await;
            match request_tx.send(request).await {
                Ok(()) => break,
                // The runtime retired between lookup and send
                Err(mpsc::error::SendError(returned)) => request = returned,
            }
        }
        reply_rx.await.map_err(|_| RuntimeError::Closed)?
    }

    /// Number of conversations with a live runtime task
    pub async fn active_conversations(&self) -> usize {
        self.runtimes
            .read()
            .await
            .values()
            .filter(|h| !h.request_tx.is_closed())
            .count()
    }

    async fn get_or_create(&self, conv_id: &str) -> mpsc::Sender<InboundRequest> {
        if let Some(handle) = self.runtimes.read().await.get(conv_id) {
            if !handle.request_tx.is_closed() {
                return handle.request_tx.clone();
            }
        }

        let mut runtimes = self.runtimes.write().await;
        // Another caller may have created it while we waited for the lock
        if let Some(handle) = runtimes.get(conv_id) {
            if !handle.request_tx.is_closed() {
                return handle.request_tx.clone();
            }
            tracing::warn!(conv_id = %conv_id, "Conversation runtime died, restarting");
        }

        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let runtime = ConversationRuntime::new(
            conv_id,
            Arc::clone(&self.controller),
            Arc::clone(&self.store),
            Arc::clone(&self.sender),
            self.settings,
        );
        tokio::spawn(runtime.run(request_rx, Arc::clone(&self.runtimes)));

        runtimes.insert(
            conv_id.to_string(),
            ConversationHandle {
                request_tx: request_tx.clone(),
            },
        );
        request_tx
    }
}

/// Drop the map entry for a conversation whose queue has drained.
///
/// Returns `None` when the runtime should stop. Requests that slipped into
/// the queue are moved to a fresh channel, which is returned so the same
/// runtime keeps serving the conversation.
pub(crate) async fn retire(
    conv_id: &str,
    request_rx: &mut mpsc::Receiver<InboundRequest>,
    runtimes: &RuntimeMap,
) -> Option<mpsc::Receiver<InboundRequest>> {
    let mut runtimes = runtimes.write().await;
    // Closing under the write lock means no new sender can be handed out;
    // senders already cloned fail and retry through `dispatch`
    request_rx.close();

    let mut pending = Vec::new();
    while let Ok(request) = request_rx.try_recv() {
        pending.push(request);
    }

    if pending.is_empty() {
        runtimes.remove(conv_id);
        tracing::debug!(conv_id = %conv_id, "Conversation runtime retired");
        return None;
    }

    let (request_tx, fresh_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    for request in pending {
        if let Err(e) = request_tx.try_send(request) {
            let _ = e.into_inner().reply.send(Err(RuntimeError::Closed));
        }
    }
    runtimes.insert(conv_id.to_string(), ConversationHandle { request_tx });
    Some(fresh_rx)
}
