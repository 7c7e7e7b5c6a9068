//! Office Copilot - Document Editing Copilot Core
//!
//! Turns a free-form request into a safely executed sequence of document
//! operations. It includes:
//! - Clarification of vague requests and template-based plan decomposition
//! - Risk previews and confirmation gating for risky steps
//! - A conversation phase machine per session
//! - Sequential plan execution with pause, resume, cancel and undo
//! - A read-result cache with write-driven invalidation
//!
//! The host supplies document access through `OperationExecutor` and user
//! prompts through `StepConfirmer` (both in `office_copilot_core`).

pub mod models;
pub mod services;
pub mod utils;

// Re-export the host contracts so embedders need a single dependency
pub use office_copilot_core::{
    ConfirmationRequest, CoreError, CoreResult, OperationArgs, OperationExecutor,
    OperationOutcome, RiskLevel, StepConfirmer, UndoAction, UndoHandle,
};

pub use models::plan::{Plan, PlanStatus, PlanStep, ResultKind, StepResult, StepStatus};
pub use models::session::{
    ClarificationAnswer, ClarificationOption, ClarificationQuestion, ConversationPhase,
    PhaseChange, QuestionType, Session,
};
pub use models::settings::CopilotConfig;
pub use services::{
    AgentReply, CopilotAgent, ExecutionControl, ExecutionMode, ExecutionObserver,
    ExecutionReport, PreviewGenerator, ToolResultCache, UndoReport,
};
pub use utils::error::{AppError, AppResult};
