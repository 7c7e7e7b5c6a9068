//! Step Executor
//!
//! Walks a plan's steps strictly in order, one at a time. Two strategies share
//! the `run` entry point:
//! - `Normal`: confirm risky steps, dispatch each operation, record results,
//!   honor pause/cancel between steps, stop on a failed high-risk step
//! - `RecordOnly`: dispatch nothing; stage one "recorded" result per step with
//!   a parameter summary and time estimate, for a later confirm-and-run
//!
//! Callback errors and panics become failed step results; `run` itself never
//! fails.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use office_copilot_core::{OperationArgs, OperationExecutor, StepConfirmer};

use crate::models::plan::{Plan, PlanStatus, PlanStep, StepResult, StepStatus};
use crate::models::settings::ExecutorConfig;

use super::control::ExecutionControl;

/// Execution strategy for `StepExecutor::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Normal,
    RecordOnly,
}

/// Outcome of one `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub mode: ExecutionMode,
    /// No step failed and the run was neither cancelled nor halted
    pub success: bool,
    /// Steps that reached a terminal status during this run
    pub completed_count: usize,
    /// Steps whose operation succeeded during this run
    pub succeeded_count: usize,
    pub results: Vec<StepResult>,
    pub cancelled: bool,
    /// Step whose failure stopped the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<String>,
}

impl ExecutionReport {
    pub fn empty(mode: ExecutionMode) -> Self {
        Self {
            mode,
            success: false,
            completed_count: 0,
            succeeded_count: 0,
            results: Vec::new(),
            cancelled: false,
            halted_at: None,
        }
    }
}

/// Outcome of `StepExecutor::undo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoReport {
    pub attempted: usize,
    /// Step ids reverted, most recent first
    pub undone: Vec<String>,
    /// `"<step id>: <error>"` for each failed undo
    pub errors: Vec<String>,
}

/// Synchronous progress callbacks, fired in scheduling order.
///
/// Each step gets `on_step_start` followed by exactly one of
/// complete/failed/skipped.
pub trait ExecutionObserver: Send + Sync {
    fn on_step_start(&self, _step: &PlanStep) {}
    fn on_step_complete(&self, _step: &PlanStep, _result: &StepResult) {}
    fn on_step_failed(&self, _step: &PlanStep, _result: &StepResult) {}
    fn on_step_skipped(&self, _step: &PlanStep, _result: &StepResult) {}
    fn on_plan_complete(&self, _plan: &Plan, _report: &ExecutionReport) {}
    fn on_plan_cancelled(&self, _plan: &Plan, _report: &ExecutionReport) {}
    /// A failed step at or above the halt threshold stopped the run
    fn on_plan_halted(&self, _plan: &Plan, _report: &ExecutionReport) {}
}

pub struct StepExecutor {
    executor: Arc<dyn OperationExecutor>,
    confirmer: Option<Arc<dyn StepConfirmer>>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    control: ExecutionControl,
    config: ExecutorConfig,
    /// Undoable results, oldest first, capped at `max_undo_history`
    history: VecDeque<StepResult>,
}

impl StepExecutor {
    pub fn new(executor: Arc<dyn OperationExecutor>, config: ExecutorConfig) -> Self {
        Self {
            executor,
            confirmer: None,
            observer: None,
            control: ExecutionControl::new(),
            config,
            history: VecDeque::new(),
        }
    }

    /// Without a confirmer every step runs regardless of `needs_confirmation`.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn StepConfirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_control(mut self, control: ExecutionControl) -> Self {
        self.control = control;
        self
    }

    pub fn set_executor(&mut self, executor: Arc<dyn OperationExecutor>) {
        self.executor = executor;
    }

    pub fn set_confirmer(&mut self, confirmer: Option<Arc<dyn StepConfirmer>>) {
        self.confirmer = confirmer;
    }

    pub fn control(&self) -> &ExecutionControl {
        &self.control
    }

    /// Results that `undo` can still revert, oldest first.
    pub fn history(&self) -> &VecDeque<StepResult> {
        &self.history
    }

    /// Keep an undoable result without its payload, dropping the oldest
    /// entries past the cap.
    fn remember(&mut self, result: &StepResult) {
        self.history.push_back(StepResult {
            data: None,
            ..result.clone()
        });
        while self.history.len() > self.config.max_undo_history {
            if let Some(dropped) = self.history.pop_front() {
                debug!(step_id = %dropped.step_id, "Dropped oldest undo entry");
            }
        }
    }

    pub async fn run(&mut self, plan: &mut Plan, mode: ExecutionMode) -> ExecutionReport {
        match mode {
            ExecutionMode::Normal => self.run_normal(plan).await,
            ExecutionMode::RecordOnly => self.run_record_only(plan),
        }
    }

    fn run_record_only(&self, plan: &Plan) -> ExecutionReport {
        let results: Vec<StepResult> = plan
            .steps
            .iter()
            .map(|step| {
                let summary =
                    parameter_summary(&step.operation_args, self.config.summary_value_max_chars);
                StepResult::recorded(step, summary, step.estimated_time_ms)
            })
            .collect();
        debug!(plan_id = %plan.id, steps = results.len(), "Recorded plan without executing");

        ExecutionReport {
            success: true,
            results,
            ..ExecutionReport::empty(ExecutionMode::RecordOnly)
        }
    }

    async fn run_normal(&mut self, plan: &mut Plan) -> ExecutionReport {
        let mut report = ExecutionReport::empty(ExecutionMode::Normal);
        let mut any_failed = false;

        plan.set_status(PlanStatus::Executing);
        info!(plan_id = %plan.id, steps = plan.steps.len(), "Starting plan execution");

        for index in 0..plan.steps.len() {
            if plan.steps[index].status.is_terminal() {
                plan.advance_to(index + 1);
                continue;
            }
            if !self.control.wait_until_runnable().await {
                info!(plan_id = %plan.id, step_index = index, "Execution cancelled");
                report.cancelled = true;
                break;
            }
            plan.advance_to(index);

            let step = &mut plan.steps[index];
            let (status, result) = self.process_step(step).await;
            step.finish(status, result.clone());
            self.notify_step(step, &result);

            report.completed_count += 1;
            match status {
                StepStatus::Completed => {
                    report.succeeded_count += 1;
                    if result.is_undoable() {
                        self.remember(&result);
                    }
                }
                StepStatus::Failed => any_failed = true,
                _ => {}
            }
            let halt = status == StepStatus::Failed
                && step.risk_level >= self.config.halt_on_failure_at;
            let step_id = step.id.clone();
            report.results.push(result);
            plan.advance_to(index + 1);

            if halt {
                warn!(plan_id = %plan.id, step_id = %step_id, "High-risk step failed, halting plan");
                report.halted_at = Some(step_id);
                break;
            }
        }

        report.success = !any_failed && !report.cancelled && report.halted_at.is_none();

        if report.cancelled {
            plan.set_status(PlanStatus::Cancelled);
            if let Some(observer) = &self.observer {
                observer.on_plan_cancelled(plan, &report);
            }
        } else if report.halted_at.is_some() {
            if let Some(observer) = &self.observer {
                observer.on_plan_halted(plan, &report);
            }
        } else {
            plan.set_status(PlanStatus::Completed);
            if let Some(observer) = &self.observer {
                observer.on_plan_complete(plan, &report);
            }
        }
        info!(
            plan_id = %plan.id,
            completed = report.completed_count,
            succeeded = report.succeeded_count,
            cancelled = report.cancelled,
            success = report.success,
            "Plan execution finished"
        );
        report
    }

    async fn process_step(&self, step: &mut PlanStep) -> (StepStatus, StepResult) {
        step.status = StepStatus::Running;
        if let Some(observer) = &self.observer {
            observer.on_step_start(step);
        }
        debug!(step_id = %step.id, operation = %step.operation_name, "Starting step");

        if step.needs_confirmation {
            if let Some(confirmer) = &self.confirmer {
                let request = step.confirmation_request();
                let decision = AssertUnwindSafe(confirmer.confirm(&request))
                    .catch_unwind()
                    .await;
                match decision {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false)) => {
                        info!(step_id = %step.id, "Step skipped, confirmation declined");
                        return (StepStatus::Skipped, StepResult::skipped(step));
                    }
                    Ok(Err(e)) => {
                        let message = format!("Confirmation failed: {e}");
                        return (
                            StepStatus::Failed,
                            StepResult::executed(step, false, message, None, 0, None),
                        );
                    }
                    Err(panic) => {
                        let message = format!("Confirmation failed: {}", panic_message(panic));
                        return (
                            StepStatus::Failed,
                            StepResult::executed(step, false, message, None, 0, None),
                        );
                    }
                }
            }
        }

        let started = Instant::now();
        let outcome = AssertUnwindSafe(
            self.executor
                .execute(&step.operation_name, &step.operation_args),
        )
        .catch_unwind()
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(outcome)) => StepResult::executed(
                step,
                outcome.success,
                outcome.message,
                outcome.data,
                elapsed_ms,
                outcome.undo,
            ),
            Ok(Err(e)) => StepResult::executed(step, false, e.to_string(), None, elapsed_ms, None),
            Err(panic) => {
                StepResult::executed(step, false, panic_message(panic), None, elapsed_ms, None)
            }
        };
        let status = if result.success {
            StepStatus::Completed
        } else {
            warn!(step_id = %step.id, operation = %step.operation_name, "Step failed: {}", result.message);
            StepStatus::Failed
        };
        (status, result)
    }

    fn notify_step(&self, step: &PlanStep, result: &StepResult) {
        let Some(observer) = &self.observer else {
            return;
        };
        match step.status {
            StepStatus::Completed => observer.on_step_complete(step, result),
            StepStatus::Failed => observer.on_step_failed(step, result),
            StepStatus::Skipped => observer.on_step_skipped(step, result),
            StepStatus::Pending | StepStatus::Running => {}
        }
    }

    /// Revert up to `count` of the most recent undoable results.
    ///
    /// Best effort: a failed undo is recorded and the walk continues.
    pub async fn undo(&mut self, count: usize) -> UndoReport {
        let mut report = UndoReport::default();
        while report.attempted < count {
            let Some(result) = self.history.pop_back() else {
                break;
            };
            let Some(handle) = result.undo.as_ref() else {
                continue;
            };
            report.attempted += 1;

            match AssertUnwindSafe(handle.undo()).catch_unwind().await {
                Ok(Ok(())) => {
                    debug!(step_id = %result.step_id, "Undid step");
                    report.undone.push(result.step_id.clone());
                }
                Ok(Err(e)) => {
                    warn!(step_id = %result.step_id, "Undo failed: {e}");
                    report.errors.push(format!("{}: {e}", result.step_id));
                }
                Err(panic) => {
                    let message = panic_message(panic);
                    warn!(step_id = %result.step_id, "Undo failed: {message}");
                    report.errors.push(format!("{}: {message}", result.step_id));
                }
            }
        }
        report
    }
}

/// `"find: A, replace: B"`, with long values truncated.
fn parameter_summary(args: &OperationArgs, max_chars: usize) -> String {
    if args.is_empty() {
        return "no parameters".to_string();
    }
    args.iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{key}: {}", truncate(&text, max_chars))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_string()
    }
}
