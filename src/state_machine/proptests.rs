//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary inbound sequences.

use super::state::*;
use super::*;
use crate::action::{Action, Evaluation, Question, EXIT_ACTION};
use crate::controller::FlowController;
use crate::flow::{Flow, FlowDecl, FlowSchema};
use futures::executor::block_on;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn yes_no(prompt: &str) -> Question {
    Question::new(prompt, |body| match body {
        "yes" => Evaluation::Answered(Value::Bool(true)),
        "no" => Evaluation::Answered(Value::Bool(false)),
        "never" => Evaluation::Failed,
        _ => Evaluation::Rejected,
    })
}

fn controller() -> FlowController {
    let mut root = Flow::new("root");
    root.reply("greet", "hello")
        .unwrap()
        .ask("ready", yes_no("Ready?").attempts(2).continue_on_fail(true))
        .unwrap()
        .message("note", "noted")
        .unwrap()
        .trigger("jump", "side")
        .unwrap();

    let mut side = Flow::new("side");
    side.reply("intro", "side flow")
        .unwrap()
        .ask("confirm", yes_no("Sure?"))
        .unwrap()
        .reply("done", "bye")
        .unwrap();

    let schema = FlowSchema::build(FlowDecl::Flow(Arc::new(side))).unwrap();
    FlowController::new(root, Some(schema)).unwrap()
}

fn inbound(body: &str) -> InboundMessage {
    InboundMessage::new("+15550100", body)
}

/// Process one inbound message the way the runtime does: resolve and apply
/// until a question waits for an answer or the conversation completes.
fn run_pass(c: &FlowController, state: &ConversationState, body: &str) -> Vec<ConversationState> {
    let msg = inbound(body);
    let mut states = vec![];
    let mut current = state.clone();
    for _ in 0..32 {
        let action = block_on(c.resolve_action(&msg, &current, &Value::Null)).unwrap();
        current = c.next_state(&msg, &current, action.as_ref()).unwrap();
        states.push(current.clone());
        if current.is_complete() || current.is_awaiting_answer() {
            break;
        }
    }
    states
}

fn is_prefix(earlier: &[HistoryEntry], later: &[HistoryEntry]) -> bool {
    later.len() >= earlier.len() && later.iter().zip(earlier).all(|(a, b)| a == b)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_body() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("yes".to_string()),
        Just("no".to_string()),
        Just("maybe".to_string()),
        Just("never".to_string()),
        Just("please exit".to_string()),
        "[a-z ]{0,12}",
    ]
}

fn arb_step_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("greet".to_string()),
        Just("ready".to_string()),
        Just("note".to_string()),
        Just("jump".to_string()),
        Just("intro".to_string()),
        Just("confirm".to_string()),
        Just("done".to_string()),
        Just(EXIT_ACTION.to_string()),
    ]
}

fn arb_action() -> impl Strategy<Value = Option<Action>> {
    let kind = prop_oneof![
        "[a-z]{1,8}".prop_map(Action::reply),
        "[a-z]{1,8}".prop_map(Action::message),
        prop_oneof![Just("root"), Just("side"), Just("nowhere")].prop_map(Action::trigger),
        Just(Action::question(yes_no("Ready?"))),
        Just(Action::exit("exit")),
    ];
    proptest::option::weighted(0.9, (kind, arb_step_name()).prop_map(|(a, n)| {
        if a.is_exit() {
            a
        } else {
            a.named(n)
        }
    }))
}

fn arb_state() -> impl Strategy<Value = ConversationState> {
    (
        prop_oneof![Just(None), Just(Some("root".to_string())), Just(Some("side".to_string()))],
        0usize..4,
        proptest::collection::vec("[a-z]{1,5}", 0..3),
        any::<bool>(),
    )
        .prop_map(|(active_flow, position, attempts, is_answering)| ConversationState {
            active_flow,
            position,
            question: QuestionState {
                attempts,
                is_answering,
            },
            ..ConversationState::default()
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// History only grows, and never rewrites what it already holds
    #[test]
    fn prop_history_append_only(bodies in proptest::collection::vec(arb_body(), 1..12)) {
        let c = controller();
        let mut state = ConversationState::new();
        for body in &bodies {
            for next in run_pass(&c, &state, body) {
                prop_assert!(is_prefix(state.interaction_history(), next.interaction_history()));
                state = next;
            }
            if state.is_complete() {
                break;
            }
        }
    }

    /// Applying arbitrary actions, valid or not, never shrinks history
    #[test]
    fn prop_direct_transitions_append_only(
        start in arb_state(),
        actions in proptest::collection::vec(arb_action(), 0..10),
    ) {
        let c = controller();
        let mut state = start;
        for action in &actions {
            match c.next_state(&inbound("x"), &state, action.as_ref()) {
                Ok(next) => {
                    prop_assert!(is_prefix(state.interaction_history(), next.interaction_history()));
                    prop_assert!(next.interaction_history().len() <= state.interaction_history().len() + 1);
                    prop_assert!(state.is_complete() <= next.is_complete());
                    state = next;
                }
                Err(_) => {}
            }
        }
    }

    /// A completed conversation resolves nothing, whatever arrives
    #[test]
    fn prop_complete_resolves_nothing(state in arb_state(), body in arb_body()) {
        let c = controller();
        let done = ConversationState { is_complete: true, ..state };
        let action = block_on(c.resolve_action(&inbound(&body), &done, &Value::Null)).unwrap();
        prop_assert!(action.is_none());
    }

    /// The exit keyword wins at every position
    #[test]
    fn prop_exit_always_exits(position in 0usize..10, prefix in "[a-z]{0,6}") {
        let c = controller();
        let state = ConversationState { position, ..ConversationState::default() };
        let body = format!("{prefix} Exit");
        let action = block_on(c.resolve_action(&inbound(&body), &state, &Value::Null)).unwrap();
        prop_assert!(action.is_some_and(|a| a.is_exit()));
    }

    /// A state that went through the token codec behaves like the original
    #[test]
    fn prop_token_round_trip_resolves_same(bodies in proptest::collection::vec(arb_body(), 0..6), next_body in arb_body()) {
        let c = controller();
        let mut state = ConversationState::new();
        for body in &bodies {
            if let Some(last) = run_pass(&c, &state, body).pop() {
                state = last;
            }
        }

        let restored = ConversationState::from_token(&state.to_token().unwrap()).unwrap();
        prop_assert_eq!(&restored, &state);

        let msg = inbound(&next_body);
        let a = block_on(c.resolve_action(&msg, &state, &Value::Null)).unwrap();
        let b = block_on(c.resolve_action(&msg, &restored, &Value::Null)).unwrap();
        prop_assert_eq!(a.as_ref().map(Action::context), b.as_ref().map(Action::context));
        prop_assert_eq!(a.as_ref().map(Action::name), b.as_ref().map(Action::name));
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_full_conversation_through_trigger() {
    let c = controller();
    let mut state = ConversationState::new();

    // greet, then prompt "Ready?"
    state = run_pass(&c, &state, "hi").pop().unwrap();
    assert_eq!(state.position(), 1);
    assert!(state.is_awaiting_answer());

    // answer, note, jump to side, intro, prompt "Sure?"
    state = run_pass(&c, &state, "yes").pop().unwrap();
    assert_eq!(state.active_flow(), Some("side"));
    assert_eq!(state.position(), 1);
    assert!(state.is_awaiting_answer());
    assert!(state.flow_context().get("ready").is_none());

    state = run_pass(&c, &state, "no").pop().unwrap();
    assert!(state.is_complete());

    let trail: Vec<_> = state
        .interaction_history()
        .iter()
        .map(|e| format!("{}:{}", e.flow, e.action))
        .collect();
    assert_eq!(
        trail,
        vec![
            "root:greet",
            "root:ready",
            "root:ready",
            "root:note",
            "root:jump",
            "side:intro",
            "side:confirm",
            "side:confirm",
            "side:done",
        ]
    );
}

#[test]
fn test_exhausted_attempts_continue_on_fail() {
    let c = controller();
    let mut state = run_pass(&c, &ConversationState::new(), "hi").pop().unwrap();

    state = run_pass(&c, &state, "maybe").pop().unwrap();
    assert_eq!(state.position(), 1);
    assert_eq!(state.question().attempts, vec!["maybe".to_string()]);

    // Second rejection hits the limit of two; "ready" continues on fail
    state = run_pass(&c, &state, "perhaps").pop().unwrap();
    assert_eq!(state.active_flow(), Some("side"));
    assert!(state.is_awaiting_answer());
}

#[test]
fn test_failed_question_without_continue_completes() {
    let c = controller();
    let mut state = ConversationState::new();
    for body in ["hi", "yes"] {
        state = run_pass(&c, &state, body).pop().unwrap();
    }
    state = run_pass(&c, &state, "never").pop().unwrap();
    assert!(state.is_complete());
    assert_eq!(state.active_flow(), Some("side"));
    assert_eq!(state.position(), 1);
}

#[test]
fn test_exit_mid_question() {
    let c = controller();
    let state = run_pass(&c, &ConversationState::new(), "hi").pop().unwrap();
    let done = run_pass(&c, &state, "exit").pop().unwrap();
    assert!(done.is_complete());
    let last = done.interaction_history().last().unwrap();
    assert_eq!(last.action, EXIT_ACTION);
    assert_eq!(last.flow, "root");
}
