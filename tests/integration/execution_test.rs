//! Executor Control Tests
//!
//! Record-only staging, cancellation and pause from inside a running plan,
//! undo, observer events and the audit trail, all driven through the agent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use office_copilot::models::plan::{PlanStep, StepResult};
use office_copilot::services::{AuditFilter, ExecutionObserver, ExecutionReport};
use office_copilot::{
    ConversationPhase, CopilotAgent, CopilotConfig, ExecutionMode, Plan, PlanStatus, ResultKind,
    StepStatus,
};

use super::support::{FakeDocument, FixedConfirmer};

const TOC_REQUEST: &str = "insert a table of contents";

fn agent() -> CopilotAgent {
    CopilotAgent::new(CopilotConfig::default()).unwrap()
}

#[tokio::test]
async fn test_record_only_never_touches_document() {
    let agent = agent();
    agent.handle_message("s", TOC_REQUEST);
    let plan = agent.current_plan("s").unwrap();

    let host = Arc::new(FakeDocument::new());
    let report = agent
        .confirm_and_execute("s", host.clone(), None, ExecutionMode::RecordOnly)
        .await;

    assert!(host.calls().is_empty());
    assert!(report.success);
    assert_eq!(report.results.len(), plan.steps.len());
    for (step, result) in plan.steps.iter().zip(&report.results) {
        assert_eq!(result.step_id, step.id);
        assert_eq!(result.operation_name, step.operation_name);
        assert_eq!(result.kind, ResultKind::Recorded);
        assert_eq!(result.estimated_time_ms, Some(step.estimated_time_ms));
    }
    assert_eq!(
        report.results[0].parameter_summary.as_deref(),
        Some("no parameters")
    );

    // Staging leaves the plan ready to run for real
    assert_eq!(agent.phase("s"), Some(ConversationPhase::AwaitingConfirmation));
    let plan = agent.current_plan("s").unwrap();
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));

    let report = agent
        .confirm_and_execute("s", host.clone(), None, ExecutionMode::Normal)
        .await;
    assert!(report.success);
    assert_eq!(host.calls().len(), 3);
}

#[tokio::test]
async fn test_cancel_during_step_stops_before_next() {
    let agent = Arc::new(agent());
    agent.handle_message("s", TOC_REQUEST);

    let handle = agent.clone();
    let host = Arc::new(FakeDocument::new().after_call(2, move || {
        handle.cancel("s");
    }));
    let report = agent
        .confirm_and_execute("s", host.clone(), None, ExecutionMode::Normal)
        .await;

    assert!(report.cancelled);
    assert!(!report.success);
    assert_eq!(report.completed_count, 2);
    assert_eq!(host.calls().len(), 2);

    let session = agent.current_session("s").unwrap();
    assert_eq!(session.phase, ConversationPhase::Cancelled);
    let plan = session.plan.unwrap();
    assert_eq!(plan.status, PlanStatus::Cancelled);
    assert_eq!(plan.steps[1].status, StepStatus::Completed);
    assert_eq!(plan.steps[2].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_pause_holds_next_step_until_resume() {
    let agent = Arc::new(agent());
    agent.handle_message("s", TOC_REQUEST);

    let handle = agent.clone();
    let host = Arc::new(FakeDocument::new().after_call(1, move || {
        handle.pause("s");
    }));

    let runner = agent.clone();
    let task_host = host.clone();
    let task = tokio::spawn(async move {
        runner
            .confirm_and_execute("s", task_host, None, ExecutionMode::Normal)
            .await
    });

    for _ in 0..200 {
        if agent.phase("s") == Some(ConversationPhase::Paused) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(agent.phase("s"), Some(ConversationPhase::Paused));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(host.calls().len(), 1);

    // The session shows live progress while the run is held
    let session = agent.current_session("s").unwrap();
    assert_eq!(session.executed_step_ids, vec!["step-1"]);
    let plan = session.plan.unwrap();
    assert_eq!(plan.status, PlanStatus::Executing);
    assert_eq!(plan.current_step_index, 1);
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert!(plan.steps[0].result.is_some());
    assert_eq!(plan.steps[1].status, StepStatus::Pending);

    assert!(agent.resume("s"));
    let report = task.await.unwrap();

    assert!(report.success);
    assert_eq!(host.calls().len(), 3);
    assert_eq!(agent.phase("s"), Some(ConversationPhase::Completed));
    let session = agent.current_session("s").unwrap();
    assert_eq!(session.executed_step_ids, vec!["step-1", "step-2", "step-3"]);
    assert_eq!(session.plan.unwrap().status, PlanStatus::Completed);
}

#[tokio::test]
async fn test_undo_reverts_most_recent_steps() {
    let agent = agent();
    agent.handle_message("s", TOC_REQUEST);
    let host = Arc::new(FakeDocument::new());
    agent
        .confirm_and_execute("s", host.clone(), None, ExecutionMode::Normal)
        .await;

    let report = agent.undo("s", 2).await;
    assert_eq!(report.attempted, 2);
    assert_eq!(report.undone, vec!["step-3", "step-2"]);
    assert!(report.errors.is_empty());
    assert_eq!(host.undone(), vec!["word_insert_toc", "word_apply_style"]);
    assert_eq!(agent.cache_stats().size, 0);

    let report = agent.undo("s", 5).await;
    assert_eq!(report.undone, vec!["step-1"]);
    assert_eq!(agent.undo("s", 1).await.attempted, 0);
}

#[tokio::test]
async fn test_unknown_session_yields_empty_reports() {
    let agent = agent();
    let host = Arc::new(FakeDocument::new());
    let report = agent
        .confirm_and_execute("missing", host.clone(), None, ExecutionMode::Normal)
        .await;
    assert!(!report.success);
    assert_eq!(report.completed_count, 0);
    assert!(report.results.is_empty());
    assert!(host.calls().is_empty());
    assert_eq!(agent.undo("missing", 1).await.attempted, 0);
}

#[tokio::test]
async fn test_completed_session_cannot_run_again() {
    let agent = agent();
    agent.handle_message("s", TOC_REQUEST);
    let host = Arc::new(FakeDocument::new());
    agent
        .confirm_and_execute("s", host.clone(), None, ExecutionMode::Normal)
        .await;
    let report = agent
        .confirm_and_execute("s", host.clone(), None, ExecutionMode::Normal)
        .await;
    assert!(report.results.is_empty());
    assert_eq!(host.calls().len(), 3);
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ExecutionObserver for EventLog {
    fn on_step_start(&self, step: &PlanStep) {
        self.push(format!("start:{}", step.id));
    }
    fn on_step_complete(&self, step: &PlanStep, _result: &StepResult) {
        self.push(format!("complete:{}", step.id));
    }
    fn on_step_skipped(&self, step: &PlanStep, _result: &StepResult) {
        self.push(format!("skipped:{}", step.id));
    }
    fn on_plan_complete(&self, _plan: &Plan, report: &ExecutionReport) {
        self.push(format!("plan_complete:{}", report.completed_count));
    }
}

#[tokio::test]
async fn test_observer_sees_declined_step_as_skipped() {
    let log = Arc::new(EventLog::default());
    let agent = agent().with_observer(log.clone());
    agent.handle_message("s", "replace draft with final");

    agent
        .confirm_and_execute(
            "s",
            Arc::new(FakeDocument::new()),
            Some(Arc::new(FixedConfirmer::new(false))),
            ExecutionMode::Normal,
        )
        .await;

    assert_eq!(
        *log.events.lock().unwrap(),
        vec![
            "start:step-1",
            "complete:step-1",
            "start:step-2",
            "skipped:step-2",
            "plan_complete:2",
        ]
    );
}

#[tokio::test]
async fn test_audit_trail_records_each_outcome() {
    let agent = agent();
    agent.handle_message("s", "replace draft with final");
    agent
        .confirm_and_execute(
            "s",
            Arc::new(FakeDocument::new()),
            Some(Arc::new(FixedConfirmer::new(false))),
            ExecutionMode::Normal,
        )
        .await;

    let stats = agent.audit().statistics();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.by_operation["word_search_text"], 1);

    let filter = AuditFilter {
        operation: Some("word_replace_text".to_string()),
        ..AuditFilter::default()
    };
    let records = agent.audit().records(&filter);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, "s");
}
