//! Conversation runtime executor
//!
//! Runs processing passes for one conversation: load state, chain
//! resolve → deliver → transition until input is needed, persist.

use super::traits::{MessageSender, Outbound, StateStore};
use super::{retire, InboundRequest, RuntimeMap, RuntimeSettings};
use crate::controller::FlowController;
use crate::error::RuntimeError;
use crate::state_machine::{ConversationState, InboundMessage};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

/// Result of one processing pass
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// State after the pass (already persisted or discarded)
    pub state: ConversationState,
    /// Messages delivered, in order, with their receipts
    pub delivered: Vec<(Outbound, Option<String>)>,
    /// The pass completed the conversation
    pub completed: bool,
}

/// Runtime for a single conversation
pub struct ConversationRuntime<S, M>
where
    S: StateStore + ?Sized + 'static,
    M: MessageSender + ?Sized + 'static,
{
    conversation_id: String,
    controller: Arc<FlowController>,
    store: Arc<S>,
    sender: Arc<M>,
    settings: RuntimeSettings,
    /// When the last outbound message left, for send spacing
    last_send: Option<Instant>,
}

impl<S, M> ConversationRuntime<S, M>
where
    S: StateStore + ?Sized + 'static,
    M: MessageSender + ?Sized + 'static,
{
    pub fn new(
        conversation_id: impl Into<String>,
        controller: Arc<FlowController>,
        store: Arc<S>,
        sender: Arc<M>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            controller,
            store,
            sender,
            settings,
            last_send: None,
        }
    }

    /// Serve queued requests one at a time. Stops when every sender is
    /// dropped, or once a pass completes the conversation and nothing else
    /// is queued for it.
    pub(crate) async fn run(mut self, mut request_rx: mpsc::Receiver<InboundRequest>, runtimes: Arc<RuntimeMap>) {
        tracing::info!(conv_id = %self.conversation_id, "Starting conversation runtime");

        while let Some(request) = request_rx.recv().await {
            let result = self
                .process_inbound(&request.message, &request.user_context)
                .await;
            if let Err(e) = &result {
                tracing::error!(conv_id = %self.conversation_id, error = %e, "Processing pass failed");
            }
            let completed = matches!(&result, Ok(outcome) if outcome.completed);
            // The caller may have given up waiting; nothing to do then
            let _ = request.reply.send(result);

            if completed {
                match retire(&self.conversation_id, &mut request_rx, &runtimes).await {
                    Some(fresh_rx) => request_rx = fresh_rx,
                    None => break,
                }
            }
        }

        tracing::info!(conv_id = %self.conversation_id, "Conversation runtime stopped");
    }

    /// Process one inbound message.
    ///
    /// Nothing is persisted unless the whole pass succeeds; on error the
    /// previously stored state is left as it was.
    pub async fn process_inbound(
        &mut self,
        message: &InboundMessage,
        user_context: &Value,
    ) -> Result<PassOutcome, RuntimeError> {
        let initial = match self
            .store
            .load_state(&self.conversation_id)
            .await
            .map_err(RuntimeError::Store)?
        {
            Some(state) if !state.is_complete() => state,
            Some(_) | None => {
                tracing::debug!(conv_id = %self.conversation_id, "Starting new conversation");
                ConversationState::new()
            }
        };

        let mut state = initial.clone();
        let mut delivered = Vec::new();
        let mut steps = 0;

        loop {
            if steps == self.settings.max_steps {
                return Err(RuntimeError::StepLimitExceeded(steps));
            }
            steps += 1;

            let mut action = self
                .controller
                .resolve_action(message, &state, user_context)
                .await?;

            if let Some(action) = action.as_mut() {
                let outbound = action.outbound().map(|(kind, body)| Outbound {
                    to: message.sender.clone(),
                    kind,
                    body: body.to_string(),
                    action: action.name().to_string(),
                });
                if let Some(outbound) = outbound {
                    let receipt = self.deliver(&outbound).await?;
                    if let Some(receipt) = &receipt {
                        action.record_receipt(receipt.clone());
                    }
                    delivered.push((outbound, receipt));
                }
            }

            state = self
                .controller
                .next_state(message, &state, action.as_ref())?;

            if state.is_complete() || state.is_awaiting_answer() {
                break;
            }
        }

        if state.is_complete() {
            self.store
                .discard_state(&self.conversation_id)
                .await
                .map_err(RuntimeError::Store)?;
        } else {
            self.store
                .save_state(&self.conversation_id, &state)
                .await
                .map_err(RuntimeError::Store)?;
        }

        let completed = !initial.is_complete() && state.is_complete();
        self.controller
            .end_interaction(&self.conversation_id, &initial, &state);

        tracing::debug!(
            conv_id = %self.conversation_id,
            steps,
            sent = delivered.len(),
            position = state.position(),
            completed,
            "Processing pass finished"
        );

        Ok(PassOutcome {
            state,
            delivered,
            completed,
        })
    }

    /// Send one message, keeping the configured spacing from the previous one
    async fn deliver(&mut self, outbound: &Outbound) -> Result<Option<String>, RuntimeError> {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.settings.send_interval {
                sleep(self.settings.send_interval - elapsed).await;
            }
        }

        let receipt = self
            .sender
            .send(outbound)
            .await
            .map_err(RuntimeError::Delivery)?;
        self.last_send = Some(Instant::now());
        Ok(receipt)
    }
}
