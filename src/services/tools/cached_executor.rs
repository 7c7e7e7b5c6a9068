//! Cached Operation Executor
//!
//! Wraps a host `OperationExecutor` with the tool result cache. Reads are
//! served from the cache when fresh; writes always reach the host and then
//! invalidate, even when they fail (the document may be partially changed).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use office_copilot_core::{CoreResult, OperationArgs, OperationExecutor, OperationOutcome};

use super::result_cache::ToolResultCache;

pub struct CachedOperationExecutor {
    inner: Arc<dyn OperationExecutor>,
    cache: Arc<ToolResultCache>,
}

impl CachedOperationExecutor {
    pub fn new(inner: Arc<dyn OperationExecutor>, cache: Arc<ToolResultCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<ToolResultCache> {
        &self.cache
    }
}

#[async_trait]
impl OperationExecutor for CachedOperationExecutor {
    async fn execute(&self, name: &str, args: &OperationArgs) -> CoreResult<OperationOutcome> {
        if let Some(cached) = self.cache.get(name, args) {
            return Ok(cached);
        }

        let result = self.inner.execute(name, args).await;

        if self.cache.is_invalidating(name) {
            let removed = self.cache.invalidate(name);
            debug!(operation = name, removed, "Write operation invalidated cached reads");
        } else if let Ok(outcome) = &result {
            // Failed reads are not worth remembering
            if outcome.success {
                self.cache.put(name, args, outcome);
            }
        }
        result
    }
}
