#[cfg(test)]
mod protocol_tests;


#[cfg(test)]
pub mod test_helpers {
    use crate::context::ToolContext;
    use kubexec_executor::{ExecutionConfig, ExecutionManager, FakePlatform};
    use std::sync::Arc;

    /// Tool context backed by an in-memory platform, plus a handle to inspect it
    pub fn create_test_context(fake: FakePlatform) -> (ToolContext, Arc<FakePlatform>) {
        let fake = Arc::new(fake);
        let config = ExecutionConfig::default().with_timeout_seconds(60);
        let manager = ExecutionManager::new(fake.clone(), config);
        (ToolContext::new(Arc::new(manager)), fake)
    }
}
