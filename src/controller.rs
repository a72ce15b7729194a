//! Flow controller
//!
//! Resolves the action for the current position of a conversation and
//! computes the state that follows it. Holds no per-conversation data; the
//! same controller serves every conversation.

use crate::action::{Action, ActionKind};
use crate::error::{ConfigError, FlowError};
use crate::flow::{Flow, FlowGraph, FlowSchema};
use crate::state_machine::{next_state, ConversationState, InboundMessage};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Whole-word, case-insensitive "exit"
pub const DEFAULT_EXIT_PATTERN: &str = r"(?i)\bexit\b";

pub type ExitTest = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Called once per conversation when it completes, with the sender id and
/// the final state
pub type CompletionHook = Arc<dyn Fn(&str, &ConversationState) + Send + Sync>;

pub struct FlowController {
    graph: FlowGraph,
    exit_test: ExitTest,
    on_complete: Option<CompletionHook>,
}

impl FlowController {
    /// Controller with the default exit test and no completion hook
    pub fn new(root: impl Into<Arc<Flow>>, schema: Option<FlowSchema>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder().root(root);
        if let Some(schema) = schema {
            builder = builder.schema(schema);
        }
        builder.build()
    }

    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn root(&self) -> &Arc<Flow> {
        self.graph.root()
    }

    pub fn schema(&self) -> Option<&FlowSchema> {
        self.graph.schema()
    }

    pub fn current_flow(&self, state: &ConversationState) -> Result<&Arc<Flow>, FlowError> {
        self.graph.current_flow(state)
    }

    pub fn is_exit(&self, body: &str) -> bool {
        (self.exit_test)(body)
    }

    /// Resolve the action for the state's current position.
    ///
    /// Returns `Ok(None)` when the conversation is complete, the position is
    /// past the end of the flow, or the step produced nothing.
    pub async fn resolve_action(
        &self,
        inbound: &InboundMessage,
        state: &ConversationState,
        user_context: &Value,
    ) -> Result<Option<Action>, FlowError> {
        if state.is_complete() {
            return Ok(None);
        }

        if self.is_exit(&inbound.body) {
            tracing::debug!(sender = %inbound.sender, "Exit keyword received");
            return Ok(Some(Action::exit(inbound.body.clone())));
        }

        let flow = self.graph.current_flow(state)?;
        let Some(step) = flow.step(state.position()) else {
            return Ok(None);
        };

        let produced = (step.resolver)(state.flow_context().clone(), user_context.clone())
            .await
            .map_err(|source| FlowError::Resolver {
                flow: flow.name().to_string(),
                step: step.name.clone(),
                source,
            })?;

        let Some(mut action) = produced else {
            tracing::debug!(flow = %flow.name(), step = %step.name, "Step produced no action");
            return Ok(None);
        };

        if let ActionKind::Question(question) = action.kind_mut() {
            question.evaluate(&inbound.body, state.question());
        }

        let action = action.named(step.name.clone());
        tracing::debug!(
            flow = %flow.name(),
            step = %step.name,
            position = state.position(),
            kind = action.kind_name(),
            "Resolved action"
        );
        Ok(Some(action))
    }

    /// Compute the state that follows `action`. Pure; `state` is untouched.
    pub fn next_state(
        &self,
        inbound: &InboundMessage,
        state: &ConversationState,
        action: Option<&Action>,
    ) -> Result<ConversationState, FlowError> {
        next_state(&self.graph, state, inbound, action)
    }

    /// Run the completion hook if `after` is the state that completed the
    /// conversation.
    pub fn end_interaction(&self, sender: &str, before: &ConversationState, after: &ConversationState) {
        if before.is_complete() || !after.is_complete() {
            return;
        }
        tracing::info!(
            sender = %sender,
            flow = after.active_flow().unwrap_or(self.root().name()),
            interactions = after.interaction_history().len(),
            "Interaction complete"
        );
        if let Some(hook) = &self.on_complete {
            hook(sender, after);
        }
    }
}

impl fmt::Debug for FlowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowController")
            .field("graph", &self.graph)
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

enum ExitSpec {
    Pattern(String),
    Predicate(ExitTest),
}

impl Default for ExitSpec {
    fn default() -> Self {
        Self::Pattern(DEFAULT_EXIT_PATTERN.to_string())
    }
}

#[derive(Default)]
pub struct ControllerBuilder {
    root: Option<Arc<Flow>>,
    schema: Option<FlowSchema>,
    exit: ExitSpec,
    on_complete: Option<CompletionHook>,
}

impl ControllerBuilder {
    #[must_use]
    pub fn root(mut self, root: impl Into<Arc<Flow>>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: FlowSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Regex matched against each inbound body
    #[must_use]
    pub fn exit_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exit = ExitSpec::Pattern(pattern.into());
        self
    }

    #[must_use]
    pub fn exit_test<F>(mut self, test: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.exit = ExitSpec::Predicate(Arc::new(test));
        self
    }

    #[must_use]
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &ConversationState) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<FlowController, ConfigError> {
        let root = self.root.ok_or(ConfigError::MissingRoot)?;
        let graph = FlowGraph::new(root, self.schema)?;
        let exit_test: ExitTest = match self.exit {
            ExitSpec::Pattern(pattern) => {
                let re = Regex::new(&pattern)?;
                Arc::new(move |body: &str| re.is_match(body))
            }
            ExitSpec::Predicate(test) => test,
        };
        Ok(FlowController {
            graph,
            exit_test,
            on_complete: self.on_complete,
        })
    }
}
