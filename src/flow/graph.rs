//! Root flow plus optional schema: everything a state can refer to

use super::{Flow, FlowSchema};
use crate::error::{ConfigError, FlowError};
use crate::state_machine::state::ConversationState;
use std::sync::Arc;

/// The validated set of flows one controller drives
#[derive(Debug, Clone)]
pub struct FlowGraph {
    root: Arc<Flow>,
    schema: Option<FlowSchema>,
}

impl FlowGraph {
    pub fn new(root: impl Into<Arc<Flow>>, schema: Option<FlowSchema>) -> Result<Self, ConfigError> {
        let root = root.into();
        if root.is_empty() {
            return Err(ConfigError::EmptyFlow(root.name().to_string()));
        }

        if let Some(schema) = &schema {
            if let Some(same_name) = schema.get(root.name()) {
                if !Arc::ptr_eq(same_name, &root) {
                    return Err(ConfigError::RootShadowedBySchema(root.name().to_string()));
                }
            }
            if !schema.names().any(|name| name != root.name()) {
                return Err(ConfigError::SchemaWithoutBranches(root.name().to_string()));
            }
            if let Some(empty) = schema.flows().find(|f| f.is_empty()) {
                return Err(ConfigError::EmptyFlow(empty.name().to_string()));
            }
        }

        Ok(Self { root, schema })
    }

    pub fn root(&self) -> &Arc<Flow> {
        &self.root
    }

    pub fn schema(&self) -> Option<&FlowSchema> {
        self.schema.as_ref()
    }

    fn is_root(&self, name: &str) -> bool {
        name == self.root.name()
    }

    /// Flow the state is currently in
    pub fn current_flow(&self, state: &ConversationState) -> Result<&Arc<Flow>, FlowError> {
        match state.active_flow() {
            None => Ok(&self.root),
            Some(name) if self.is_root(name) => Ok(&self.root),
            Some(name) => self
                .schema
                .as_ref()
                .and_then(|s| s.get(name))
                .ok_or_else(|| FlowError::InvalidFlowReference(name.to_string())),
        }
    }

    /// Check that a trigger may switch to `target`
    pub fn check_trigger_target(&self, target: &str) -> Result<(), FlowError> {
        if self.is_root(target) {
            return Ok(());
        }
        match &self.schema {
            None => Err(FlowError::NoSchema(target.to_string())),
            Some(schema) if schema.contains(target) => Ok(()),
            Some(_) => Err(FlowError::UndeclaredFlow(target.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowDecl;

    fn flow(name: &str) -> Arc<Flow> {
        let mut flow = Flow::new(name);
        flow.reply("hello", "hello").unwrap();
        Arc::new(flow)
    }

    fn at_flow(name: &str) -> ConversationState {
        ConversationState {
            active_flow: Some(name.to_string()),
            ..ConversationState::default()
        }
    }

    #[test]
    fn empty_root_rejected() {
        let err = FlowGraph::new(Flow::new("root"), None).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyFlow(name) if name == "root"));
        assert!(FlowGraph::new(flow("root"), None).is_ok());
    }

    #[test]
    fn schema_with_only_root_rejected() {
        let root = flow("root");
        let schema = FlowSchema::build(root.clone()).unwrap();
        let err = FlowGraph::new(root, Some(schema)).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaWithoutBranches(_)));
    }

    #[test]
    fn schema_may_contain_root_itself() {
        let root = flow("root");
        let schema = FlowSchema::build(FlowDecl::branch(root.clone(), [flow("other").into()])).unwrap();
        assert!(FlowGraph::new(root, Some(schema)).is_ok());
    }

    #[test]
    fn schema_flow_shadowing_root_rejected() {
        let schema = FlowSchema::build(vec![flow("root").into(), flow("other").into()]).unwrap();
        let err = FlowGraph::new(flow("root"), Some(schema)).unwrap_err();
        assert!(matches!(err, ConfigError::RootShadowedBySchema(_)));
    }

    #[test]
    fn empty_schema_flow_rejected() {
        let schema = FlowSchema::build(vec![flow("other").into(), Flow::new("hollow").into()]).unwrap();
        let err = FlowGraph::new(flow("root"), Some(schema)).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyFlow(name) if name == "hollow"));
    }

    #[test]
    fn current_flow_resolution() {
        let schema = FlowSchema::build(flow("billing")).unwrap();
        let graph = FlowGraph::new(flow("root"), Some(schema)).unwrap();

        assert_eq!(graph.current_flow(&ConversationState::new()).unwrap().name(), "root");
        assert_eq!(graph.current_flow(&at_flow("root")).unwrap().name(), "root");
        assert_eq!(graph.current_flow(&at_flow("billing")).unwrap().name(), "billing");
        assert!(matches!(
            graph.current_flow(&at_flow("forged")),
            Err(FlowError::InvalidFlowReference(name)) if name == "forged"
        ));
    }

    #[test]
    fn trigger_targets() {
        let bare = FlowGraph::new(flow("root"), None).unwrap();
        assert!(bare.check_trigger_target("root").is_ok());
        assert!(matches!(bare.check_trigger_target("billing"), Err(FlowError::NoSchema(_))));

        let schema = FlowSchema::build(flow("billing")).unwrap();
        let graph = FlowGraph::new(flow("root"), Some(schema)).unwrap();
        assert!(graph.check_trigger_target("billing").is_ok());
        assert!(matches!(graph.check_trigger_target("nowhere"), Err(FlowError::UndeclaredFlow(_))));
    }
}
