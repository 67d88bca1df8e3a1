//! Context shared by every tool invocation
//!
//! Holds the execution manager so tests can hand the tools a manager backed
//! by an in-memory platform instead of a live cluster.

use kubexec_config::DEFAULT_NAME_PREFIX;
use kubexec_executor::ExecutionManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct ToolContext {
    pub(crate) manager: Arc<ExecutionManager>,
    pub(crate) default_prefix: String,
}

impl ToolContext {
    pub fn new(manager: Arc<ExecutionManager>) -> Self {
        Self {
            manager,
            default_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }

    /// Prefix used for resource names when a tool call does not give one
    pub fn with_default_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = prefix.into();
        self
    }

    pub fn manager(&self) -> &Arc<ExecutionManager> {
        &self.manager
    }
}
