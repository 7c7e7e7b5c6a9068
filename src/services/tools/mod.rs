//! Tool Layer
//!
//! Caching in front of the host's document operations:
//! - ToolResultCache: TTL cache of read results with write invalidation
//! - CachedOperationExecutor: `OperationExecutor` decorator using the cache

pub mod cached_executor;
pub mod result_cache;

pub use cached_executor::CachedOperationExecutor;
pub use result_cache::{CacheStats, ToolResultCache};
