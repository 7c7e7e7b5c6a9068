//! Host Operation Contracts
//!
//! The copilot never touches a document directly. The host supplies:
//!
//! - `OperationExecutor` - runs one named operation against the live document
//! - `StepConfirmer` - asks the user whether a risky step may proceed
//!
//! Operation names and argument shapes are an open, host-defined catalog,
//! so they travel as plain strings and JSON maps.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreResult;

/// Operation arguments as passed to the host.
pub type OperationArgs = Map<String, Value>;

// ============================================================================
// Risk Level
// ============================================================================

/// Coarse classification of how disruptive or irreversible an operation is.
///
/// Ordered so that `max()` over a set of levels yields the most severe one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Whether a step at this level must be confirmed by the user.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Medium
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

// ============================================================================
// Undo
// ============================================================================

/// Compensating action attached to a completed operation.
#[async_trait]
pub trait UndoAction: Send + Sync {
    /// Revert the effect of the operation this action was attached to.
    async fn undo(&self) -> CoreResult<()>;
}

/// Shareable handle to an `UndoAction`.
#[derive(Clone)]
pub struct UndoHandle(Arc<dyn UndoAction>);

impl UndoHandle {
    pub fn new(action: impl UndoAction + 'static) -> Self {
        Self(Arc::new(action))
    }

    pub async fn undo(&self) -> CoreResult<()> {
        self.0.undo().await
    }
}

impl fmt::Debug for UndoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UndoHandle(..)")
    }
}

// ============================================================================
// Operation Outcome
// ============================================================================

/// Result of running one operation against the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable status message (error text on failure)
    #[serde(default)]
    pub message: String,
    /// Operation payload, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Compensating action supplied by the host
    #[serde(skip)]
    pub undo: Option<UndoHandle>,
}

impl OperationOutcome {
    /// Create a successful outcome carrying data
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            message: String::new(),
            data: Some(data),
            undo: None,
        }
    }

    /// Create a failed outcome
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            undo: None,
        }
    }

    /// Attach a compensating action
    pub fn with_undo(mut self, action: impl UndoAction + 'static) -> Self {
        self.undo = Some(UndoHandle::new(action));
        self
    }
}

// ============================================================================
// Host Callbacks
// ============================================================================

/// Executes named operations against the live document.
///
/// Implementations should report failure through `OperationOutcome::success`.
/// An `Err` is still tolerated and is converted into a failed outcome by callers.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &OperationArgs) -> CoreResult<OperationOutcome>;
}

/// What the user is asked to approve before a risky step runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub step_id: String,
    pub step_index: usize,
    pub description: String,
    pub operation_name: String,
    pub operation_args: OperationArgs,
    pub risk_level: RiskLevel,
    pub can_undo: bool,
}

/// Asks the user whether a step may proceed.
#[async_trait]
pub trait StepConfirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> CoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopUndo;

    #[async_trait]
    impl UndoAction for NoopUndo {
        async fn undo(&self) -> CoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
        let max = [RiskLevel::Medium, RiskLevel::Critical, RiskLevel::Low]
            .into_iter()
            .max();
        assert_eq!(max, Some(RiskLevel::Critical));
    }

    #[test]
    fn test_requires_confirmation() {
        assert!(!RiskLevel::Low.requires_confirmation());
        assert!(!RiskLevel::Medium.requires_confirmation());
        assert!(RiskLevel::High.requires_confirmation());
        assert!(RiskLevel::Critical.requires_confirmation());
    }

    #[test]
    fn test_outcome_serialization_skips_undo() {
        let outcome = OperationOutcome::ok(json!({"count": 3})).with_undo(NoopUndo);
        assert!(outcome.undo.is_some());
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], json!(true));
        assert!(value.get("undo").is_none());
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = OperationOutcome::failed("range not found");
        assert!(!outcome.success);
        assert_eq!(outcome.message, "range not found");
        assert!(outcome.data.is_none());
    }

    #[tokio::test]
    async fn test_undo_handle_invokes_action() {
        let handle = UndoHandle::new(NoopUndo);
        assert!(handle.undo().await.is_ok());
        assert_eq!(format!("{:?}", handle), "UndoHandle(..)");
    }
}
