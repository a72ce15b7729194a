//! Flowline - conversation flows over asynchronous messaging channels
//!
//! One inbound message triggers zero or more outbound messages. A
//! [`FlowController`] walks a graph of named [`Flow`]s, and the per-conversation
//! [`ConversationState`] records where each conversation stands between
//! messages.

pub mod action;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod flow;
pub mod runtime;
pub mod state_machine;

pub use action::{Action, ActionContext, ActionKind, Evaluation, OutboundKind, Question, QuestionPhase};
pub use config::AppConfig;
pub use controller::{ControllerBuilder, FlowController};
pub use error::{BoxError, ConfigError, FlowError, RuntimeError};
pub use flow::{Flow, FlowDecl, FlowGraph, FlowSchema};
pub use runtime::{ConversationManager, ConversationRuntime, PassOutcome, RuntimeSettings};
pub use state_machine::{ConversationState, FlowContext, InboundMessage};
