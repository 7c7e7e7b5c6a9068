//! Plan Models
//!
//! A Plan is an ordered, fixed-shape list of Steps produced by decomposing a
//! request. Each Step wraps one document operation plus its risk metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use office_copilot_core::{ConfirmationRequest, OperationArgs, RiskLevel, UndoHandle};

// ============================================================================
// Status Types
// ============================================================================

/// Execution status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Confirmed,
    Executing,
    Completed,
    Cancelled,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStatus::Draft => write!(f, "draft"),
            PlanStatus::Confirmed => write!(f, "confirmed"),
            PlanStatus::Executing => write!(f, "executing"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ============================================================================
// Step Result
// ============================================================================

/// How a step result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// The operation was dispatched to the host
    Executed,
    /// The user declined the confirmation prompt
    Skipped,
    /// Staged in record-only mode; nothing was dispatched
    Recorded,
}

/// Outcome of processing one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub step_index: usize,
    pub operation_name: String,
    pub kind: ResultKind,
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Wall-clock time spent in the execute callback
    #[serde(default)]
    pub elapsed_ms: u64,
    pub can_undo: bool,
    /// Human-readable argument summary (record-only mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_ms: Option<u64>,
    #[serde(skip)]
    pub undo: Option<UndoHandle>,
}

impl StepResult {
    fn base(step: &PlanStep, kind: ResultKind, success: bool) -> Self {
        Self {
            step_id: step.id.clone(),
            step_index: step.index,
            operation_name: step.operation_name.clone(),
            kind,
            success,
            message: String::new(),
            data: None,
            elapsed_ms: 0,
            can_undo: step.can_undo,
            parameter_summary: None,
            estimated_time_ms: None,
            undo: None,
        }
    }

    /// Result of a dispatched operation.
    pub fn executed(
        step: &PlanStep,
        success: bool,
        message: impl Into<String>,
        data: Option<Value>,
        elapsed_ms: u64,
        undo: Option<UndoHandle>,
    ) -> Self {
        Self {
            message: message.into(),
            data,
            elapsed_ms,
            undo,
            ..Self::base(step, ResultKind::Executed, success)
        }
    }

    /// Result of a step the user declined.
    pub fn skipped(step: &PlanStep) -> Self {
        Self {
            message: "Skipped: confirmation declined".to_string(),
            ..Self::base(step, ResultKind::Skipped, true)
        }
    }

    /// Placeholder produced by record-only mode.
    pub fn recorded(step: &PlanStep, parameter_summary: String, estimated_time_ms: u64) -> Self {
        Self {
            message: "recorded".to_string(),
            parameter_summary: Some(parameter_summary),
            estimated_time_ms: Some(estimated_time_ms),
            ..Self::base(step, ResultKind::Recorded, true)
        }
    }

    /// Whether this result can be reverted by `undo`.
    pub fn is_undoable(&self) -> bool {
        self.kind == ResultKind::Executed && self.success && self.can_undo && self.undo.is_some()
    }
}

// ============================================================================
// Plan Step
// ============================================================================

/// One operation within a plan, with scheduling and risk metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// Unique step identifier (e.g., "step-1")
    pub id: String,
    /// Position in the plan (0-based)
    pub index: usize,
    pub description: String,
    pub operation_name: String,
    #[serde(default)]
    pub operation_args: OperationArgs,
    pub status: StepStatus,
    pub risk_level: RiskLevel,
    pub can_undo: bool,
    pub needs_confirmation: bool,
    pub estimated_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
    /// Review issue this step was generated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_issue_id: Option<String>,
    /// Where in the document the step applies, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
}

impl PlanStep {
    /// Record a terminal status. Returns false if the step already finished.
    pub fn finish(&mut self, status: StepStatus, result: StepResult) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.result = Some(result);
        true
    }

    pub fn confirmation_request(&self) -> ConfirmationRequest {
        ConfirmationRequest {
            step_id: self.id.clone(),
            step_index: self.index,
            description: self.description.clone(),
            operation_name: self.operation_name.clone(),
            operation_args: self.operation_args.clone(),
            risk_level: self.risk_level,
            can_undo: self.can_undo,
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

/// An ordered sequence of steps decomposed from a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Steps in execution order; shape is fixed after creation
    pub steps: Vec<PlanStep>,
    pub current_step_index: usize,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Create a draft plan, numbering steps in the given order.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        mut steps: Vec<PlanStep>,
    ) -> Self {
        for (i, step) in steps.iter_mut().enumerate() {
            step.index = i;
            step.id = format!("step-{}", i + 1);
        }
        let now = Utc::now();
        Self {
            id: format!("plan-{}", Uuid::new_v4()),
            title: title.into(),
            description: description.into(),
            steps,
            current_step_index: 0,
            status: PlanStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the cursor forward. Lower indexes are ignored.
    pub fn advance_to(&mut self, index: usize) {
        if index > self.current_step_index {
            self.current_step_index = index.min(self.steps.len());
            self.updated_at = Utc::now();
        }
    }

    pub fn set_status(&mut self, status: PlanStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn total_estimated_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.estimated_time_ms).sum()
    }
}
