//! Plan Mode Service
//!
//! From request to executed plan:
//! - Clarification of vague requests into structured questions
//! - Template-based decomposition into ordered, risk-annotated steps
//! - Per-session conversation phases with an enforced transition table
//! - Sequential step execution with confirmation, pause/cancel and undo

pub mod clarifier;
pub mod control;
pub mod conversation;
pub mod decomposer;
pub mod step_executor;

pub use clarifier::ClarificationEngine;
pub use control::ExecutionControl;
pub use conversation::{ConversationStore, PhaseListener, PhaseNotifications};
pub use decomposer::{Decomposer, ReviewIssue, ReviewResult};
pub use step_executor::{
    ExecutionMode, ExecutionObserver, ExecutionReport, StepExecutor, UndoReport,
};
