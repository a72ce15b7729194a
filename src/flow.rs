//! Flows: named, ordered sequences of action-producing steps

pub mod graph;
pub mod schema;

pub use graph::FlowGraph;
pub use schema::{FlowDecl, FlowSchema};

use crate::action::{Action, Question};
use crate::error::{BoxError, ConfigError};
use crate::state_machine::state::FlowContext;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type ResolverResult = Result<Option<Action>, BoxError>;

/// Produces the action for one step.
///
/// Receives its own copy of the flow-scoped context and the caller-supplied
/// user context. `Ok(None)` means the step has nothing to do, which ends the
/// interaction.
pub type Resolver = Arc<dyn Fn(FlowContext, Value) -> BoxFuture<'static, ResolverResult> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Step {
    pub name: String,
    pub resolver: Resolver,
}

/// A named, ordered list of steps. Immutable once handed to a schema or
/// controller (both hold it behind an `Arc`).
#[derive(Clone)]
pub struct Flow {
    name: String,
    steps: Vec<Step>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Register a step at the end of the flow.
    pub fn append<F, Fut>(&mut self, name: impl Into<String>, resolver: F) -> Result<&mut Self, ConfigError>
    where
        F: Fn(FlowContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        let name = name.into();
        if self.has_step(&name) {
            return Err(ConfigError::DuplicateStep {
                flow: self.name.clone(),
                step: name,
            });
        }
        let boxed: Resolver = Arc::new(move |ctx: FlowContext, user: Value| resolver(ctx, user).boxed());
        self.steps.push(Step {
            name,
            resolver: boxed,
        });
        Ok(self)
    }

    /// Step that always resolves to the same action
    fn append_fixed(&mut self, name: impl Into<String>, action: Action) -> Result<&mut Self, ConfigError> {
        self.append(name, move |_, _| {
            let action = action.clone();
            async move { Ok(Some(action)) }
        })
    }

    pub fn reply(&mut self, name: impl Into<String>, body: impl Into<String>) -> Result<&mut Self, ConfigError> {
        self.append_fixed(name, Action::reply(body))
    }

    pub fn message(&mut self, name: impl Into<String>, body: impl Into<String>) -> Result<&mut Self, ConfigError> {
        self.append_fixed(name, Action::message(body))
    }

    pub fn ask(&mut self, name: impl Into<String>, question: Question) -> Result<&mut Self, ConfigError> {
        self.append_fixed(name, Action::question(question))
    }

    pub fn trigger(&mut self, name: impl Into<String>, target: impl Into<String>) -> Result<&mut Self, ConfigError> {
        self.append_fixed(name, Action::trigger(target))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn action_names(&self) -> BTreeSet<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    pub(crate) fn step(&self, position: usize) -> Option<&Step> {
        self.steps.get(position)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("steps", &self.steps.iter().map(|s| &s.name).collect::<Vec<_>>())
            .finish()
    }
}
