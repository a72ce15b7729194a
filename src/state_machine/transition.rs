//! Pure state transition function
//!
//! Given the current state and the outcome of one resolved action, compute
//! the next state. The input state is never mutated; on error nothing of the
//! transition is applied.

use super::event::InboundMessage;
use super::state::{ConversationState, HistoryEntry};
use crate::action::{Action, ActionContext, ActionKind, Question, QuestionPhase, EXIT_ACTION};
use crate::error::FlowError;
use crate::flow::FlowGraph;

/// Compute the state that follows `action`.
///
/// `None` stands for "the step produced nothing", which completes the
/// interaction.
pub fn next_state(
    graph: &FlowGraph,
    state: &ConversationState,
    inbound: &InboundMessage,
    action: Option<&Action>,
) -> Result<ConversationState, FlowError> {
    let mut next = state.clone();

    let Some(action) = action else {
        complete_interaction(&mut next);
        return Ok(next);
    };

    match action.kind() {
        ActionKind::Exit { .. } => {
            record_context(graph, &mut next, action)?;
            complete_interaction(&mut next);
        }

        ActionKind::Question(question) => {
            question_transition(graph, &mut next, inbound, action, question)?;
        }

        ActionKind::Trigger { target } => {
            graph.check_trigger_target(target)?;
            record_context(graph, &mut next, action)?;
            switch_flow(&mut next, target);
        }

        ActionKind::Message { .. } | ActionKind::Reply { .. } => {
            record_context(graph, &mut next, action)?;
            advance(graph, &mut next)?;
        }
    }

    Ok(next)
}

fn question_transition(
    graph: &FlowGraph,
    state: &mut ConversationState,
    inbound: &InboundMessage,
    action: &Action,
    question: &Question,
) -> Result<(), FlowError> {
    let was_answering = state.question.is_answering;

    // An attempt is appended once, even if the question is applied again
    // before the state it was evaluated against has been replaced
    if was_answering && state.question.attempts.len() == question.attempts_seen() {
        state.question.attempts.push(inbound.body.clone());
    }

    record_context(graph, state, action)?;

    match question.phase() {
        QuestionPhase::Answered => advance(graph, state)?,
        QuestionPhase::Failed if question.continues_on_fail() => advance(graph, state)?,
        QuestionPhase::Failed => complete_interaction(state),
        QuestionPhase::Idle | QuestionPhase::Prompting if !was_answering => {
            state.question.is_answering = true;
            state.question.attempts.clear();
        }
        // Still pending while answering: the attempt is already recorded
        QuestionPhase::Idle | QuestionPhase::Prompting | QuestionPhase::Answering => {}
    }
    Ok(())
}

/// Write the action's snapshot into the flow context and append it to the
/// interaction history.
fn record_context(
    graph: &FlowGraph,
    state: &mut ConversationState,
    action: &Action,
) -> Result<(), FlowError> {
    let flow = graph.current_flow(state)?;
    let name = action.name();
    if name != EXIT_ACTION && !flow.has_step(name) {
        return Err(FlowError::ForeignAction {
            flow: flow.name().to_string(),
            action: name.to_string(),
        });
    }

    let mut snapshot = action.context();
    if let ActionContext::Question { receipts, .. } = &mut snapshot {
        if let Some(previous) = state.flow_context.get(name) {
            let mut merged = previous.receipts().to_vec();
            for receipt in receipts.drain(..) {
                if !merged.contains(&receipt) {
                    merged.push(receipt);
                }
            }
            *receipts = merged;
        }
    }

    let flow_name = flow.name().to_string();
    state.flow_context.insert(name.to_string(), snapshot.clone());
    state.interaction_history.push(HistoryEntry {
        flow: flow_name,
        action: name.to_string(),
        context: snapshot,
    });
    Ok(())
}

/// Move to the next step; running off the end of the flow completes the
/// interaction.
fn advance(graph: &FlowGraph, state: &mut ConversationState) -> Result<(), FlowError> {
    let len = graph.current_flow(state)?.len();
    state.position += 1;
    state.question.is_answering = false;
    if state.position >= len {
        complete_interaction(state);
    }
    Ok(())
}

fn switch_flow(state: &mut ConversationState, target: &str) {
    tracing::info!(
        from = state.active_flow().unwrap_or("<root>"),
        to = %target,
        "Switching flow"
    );
    state.active_flow = Some(target.to_string());
    state.position = 0;
    state.flow_context.clear();
    state.question.is_answering = false;
    state.question.attempts.clear();
}

fn complete_interaction(state: &mut ConversationState) {
    state.is_complete = true;
    state.question.is_answering = false;
}
