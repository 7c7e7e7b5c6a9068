//! Services
//!
//! Business logic services for the copilot.
//! The agent facade drives the plan-mode components for each session.

pub mod agent;
pub mod audit;
pub mod plan_mode;
pub mod preview;
pub mod tools;

pub use agent::{AgentReply, CopilotAgent};
pub use audit::{AuditFilter, AuditLog, AuditRecord, AuditStatistics, AuditStatus};
pub use plan_mode::{
    ClarificationEngine, ConversationStore, Decomposer, ExecutionControl, ExecutionMode,
    ExecutionObserver, ExecutionReport, ReviewIssue, ReviewResult, StepExecutor, UndoReport,
};
pub use preview::{FormatChange, OperationPreview, PlanPreview, PreviewGenerator};
pub use tools::{CacheStats, CachedOperationExecutor, ToolResultCache};
