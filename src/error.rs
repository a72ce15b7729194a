//! Error types for flow construction and conversation processing

use thiserror::Error;

/// Boxed error returned by user-supplied step resolvers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Construction-time validation failures.
///
/// These prevent a controller (or the flows and schema feeding it) from being
/// created at all; there is nothing to recover at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No root flow configured")]
    MissingRoot,
    #[error("Flow '{0}' has no steps")]
    EmptyFlow(String),
    #[error("Step '{step}' is declared twice in flow '{flow}'")]
    DuplicateStep { flow: String, step: String },
    #[error("Flow name '{0}' is used by more than one flow")]
    DuplicateFlow(String),
    #[error("Flow schema declares no flows")]
    EmptySchema,
    #[error("Flow schema has no flow besides the root '{0}'")]
    SchemaWithoutBranches(String),
    #[error("Schema flow '{0}' shares its name with the root flow")]
    RootShadowedBySchema(String),
    #[error("Invalid exit pattern: {0}")]
    InvalidExitPattern(#[from] regex::Error),
}

/// Errors raised while resolving an action or computing the next state.
///
/// The controller never retries these; the previously persisted state is left
/// untouched and recovery is up to the caller.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Conversation state references unknown flow '{0}'")]
    InvalidFlowReference(String),
    #[error("Trigger targets undeclared flow '{0}'")]
    UndeclaredFlow(String),
    #[error("Trigger to '{0}' requires a flow schema")]
    NoSchema(String),
    #[error("Action '{action}' is not a step of flow '{flow}'")]
    ForeignAction { flow: String, action: String },
    #[error("Step '{step}' of flow '{flow}' failed: {source}")]
    Resolver {
        flow: String,
        step: String,
        #[source]
        source: BoxError,
    },
}

/// Failure of one processing pass in the conversation runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("State store error: {0}")]
    Store(String),
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Pass chained {0} actions without waiting for input")]
    StepLimitExceeded(usize),
    #[error("Conversation runtime is not running")]
    Closed,
}
