//! Flow schema: the declared graph of flows a controller may switch between

use super::Flow;
use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Nested declaration of flows.
///
/// Branches let a declaration mirror how flows hand off to one another; the
/// nesting carries no runtime meaning once the schema is built.
#[derive(Debug, Clone)]
pub enum FlowDecl {
    Flow(Arc<Flow>),
    Branch {
        flow: Arc<Flow>,
        children: Vec<FlowDecl>,
    },
    Group(Vec<FlowDecl>),
}

impl FlowDecl {
    pub fn branch(flow: impl Into<Arc<Flow>>, children: impl IntoIterator<Item = FlowDecl>) -> Self {
        Self::Branch {
            flow: flow.into(),
            children: children.into_iter().collect(),
        }
    }

    pub fn group(items: impl IntoIterator<Item = FlowDecl>) -> Self {
        Self::Group(items.into_iter().collect())
    }
}

impl From<Arc<Flow>> for FlowDecl {
    fn from(flow: Arc<Flow>) -> Self {
        Self::Flow(flow)
    }
}

impl From<Flow> for FlowDecl {
    fn from(flow: Flow) -> Self {
        Self::Flow(Arc::new(flow))
    }
}

impl From<Vec<FlowDecl>> for FlowDecl {
    fn from(items: Vec<FlowDecl>) -> Self {
        Self::Group(items)
    }
}

/// Flat, read-only mapping from flow name to flow
#[derive(Debug, Clone, Default)]
pub struct FlowSchema {
    flows: BTreeMap<String, Arc<Flow>>,
}

impl FlowSchema {
    /// Flatten a declaration depth-first.
    ///
    /// The same `Arc<Flow>` may be declared under several branches; two
    /// distinct flows sharing a name is an error.
    pub fn build(decl: impl Into<FlowDecl>) -> Result<Self, ConfigError> {
        let mut flows: BTreeMap<String, Arc<Flow>> = BTreeMap::new();
        let mut stack = vec![decl.into()];

        while let Some(node) = stack.pop() {
            let children = match node {
                FlowDecl::Flow(flow) => {
                    insert_unique(&mut flows, flow)?;
                    continue;
                }
                FlowDecl::Branch { flow, children } => {
                    insert_unique(&mut flows, flow)?;
                    children
                }
                FlowDecl::Group(children) => children,
            };
            // Reversed so siblings are visited in declaration order
            stack.extend(children.into_iter().rev());
        }

        if flows.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        Ok(Self { flows })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Flow>> {
        self.flows.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flows.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    pub fn flows(&self) -> impl Iterator<Item = &Arc<Flow>> {
        self.flows.values()
    }
}

fn insert_unique(flows: &mut BTreeMap<String, Arc<Flow>>, flow: Arc<Flow>) -> Result<(), ConfigError> {
    match flows.get(flow.name()) {
        Some(existing) if Arc::ptr_eq(existing, &flow) => Ok(()),
        Some(_) => Err(ConfigError::DuplicateFlow(flow.name().to_string())),
        None => {
            flows.insert(flow.name().to_string(), flow);
            Ok(())
        }
    }
}
