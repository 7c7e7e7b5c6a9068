//! Office Copilot Core
//!
//! Foundational error types and host callback contracts for the Office Copilot
//! workspace. This crate has zero dependencies on application-level code
//! (planning, caching, execution).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `operation` - Host callbacks (`OperationExecutor`, `StepConfirmer`) and
//!   the values they exchange (`OperationOutcome`, `ConfirmationRequest`, `RiskLevel`)

pub mod error;
pub mod operation;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Host Contracts ─────────────────────────────────────────────────────
pub use operation::{
    ConfirmationRequest, OperationArgs, OperationExecutor, OperationOutcome, RiskLevel,
    StepConfirmer, UndoAction, UndoHandle,
};
