//! Request-to-Execution Scenario Tests
//!
//! Drives the agent through the three reference conversations: a vague request
//! that needs clarification, a direct high-risk replacement, and a plan that
//! halts on a failed high-risk step.

use std::sync::{Arc, Mutex};

use office_copilot::models::settings::ClarificationConfig;
use office_copilot::services::plan_mode::{ClarificationEngine, ReviewIssue, ReviewResult};
use office_copilot::{
    AgentReply, ClarificationAnswer, ConversationPhase, CopilotAgent, CopilotConfig,
    ExecutionMode, OperationExecutor, PlanStatus, PreviewGenerator, RiskLevel, StepStatus,
};

use super::support::{FakeDocument, FixedConfirmer};

fn agent() -> CopilotAgent {
    CopilotAgent::new(CopilotConfig::default()).unwrap()
}

// ============================================================================
// Scenario 1: vague request
// ============================================================================

#[test]
fn test_tidy_request_needs_clarification() {
    let engine = ClarificationEngine::new(
        ClarificationConfig::default(),
        Arc::new(PreviewGenerator::default()),
    )
    .unwrap();
    assert!(engine.needs_clarification("tidy this up"));
    let question = engine.generate_question("tidy this up");
    assert!(question.options.iter().any(|o| o.id == "format"));
}

#[tokio::test]
async fn test_tidy_request_end_to_end() {
    let agent = agent();

    let AgentReply::NeedsClarification { question } = agent.handle_message("s1", "tidy this up")
    else {
        panic!("expected a clarification question");
    };
    assert!(question.option("format").is_some());
    assert_eq!(agent.phase("s1"), Some(ConversationPhase::Clarifying));

    let reply = agent.answer_clarification(
        "s1",
        &question.id,
        ClarificationAnswer::Option("format".to_string()),
    );
    let AgentReply::PlanProposed { plan, preview } = reply else {
        panic!("expected a plan after answering");
    };
    let style_step = plan
        .steps
        .iter()
        .find(|s| s.operation_name == "word_apply_style")
        .unwrap();
    assert_eq!(style_step.risk_level, RiskLevel::Low);
    assert!(plan.steps.iter().all(|s| s.risk_level <= RiskLevel::Medium));
    assert!(!preview.requires_confirmation);
    assert_eq!(agent.phase("s1"), Some(ConversationPhase::AwaitingConfirmation));

    let host = Arc::new(FakeDocument::new());
    let report = agent
        .confirm_and_execute("s1", host.clone(), None, ExecutionMode::Normal)
        .await;
    assert!(report.success);
    assert_eq!(report.completed_count, plan.steps.len());
    assert_eq!(host.calls().len(), plan.steps.len());

    let session = agent.current_session("s1").unwrap();
    assert_eq!(session.phase, ConversationPhase::Completed);
    assert_eq!(session.executed_step_ids.len(), plan.steps.len());
    assert_eq!(session.plan.unwrap().status, PlanStatus::Completed);
    assert!(session.context_summary.contains("formatting"));
}

// ============================================================================
// Scenario 2: direct high-risk replacement
// ============================================================================

#[test]
fn test_replace_request_is_direct_and_high_risk() {
    let agent = agent();
    let reply = agent.handle_message("s2", "replace A with B");
    let AgentReply::PlanProposed { plan, preview } = reply else {
        panic!("expected a plan without clarification");
    };

    let index = plan
        .steps
        .iter()
        .position(|s| s.operation_name == "word_replace_text")
        .unwrap();
    assert_eq!(plan.steps[index].risk_level, RiskLevel::High);
    assert!(plan.steps[index].needs_confirmation);

    let step_preview = &preview.steps[index];
    assert!(step_preview.requires_confirmation);
    assert!(!step_preview.warnings.is_empty());
    assert_eq!(preview.overall_risk, RiskLevel::High);
}

#[tokio::test]
async fn test_replace_confirmed_runs_both_steps() {
    let agent = agent();
    agent.handle_message("s2", "replace A with B");

    let host = Arc::new(FakeDocument::new());
    let confirmer = Arc::new(FixedConfirmer::new(true));
    let report = agent
        .confirm_and_execute("s2", host.clone(), Some(confirmer.clone()), ExecutionMode::Normal)
        .await;

    assert!(report.success);
    assert_eq!(host.calls(), vec!["word_search_text", "word_replace_text"]);
    let prompts = confirmer.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].operation_name, "word_replace_text");
    assert_eq!(prompts[0].operation_args["find"], "A");
}

#[tokio::test]
async fn test_replace_declined_is_skipped_not_failed() {
    let agent = agent();
    agent.handle_message("s2", "replace A with B");

    let host = Arc::new(FakeDocument::new());
    let report = agent
        .confirm_and_execute(
            "s2",
            host.clone(),
            Some(Arc::new(FixedConfirmer::new(false))),
            ExecutionMode::Normal,
        )
        .await;

    assert!(report.success);
    assert_eq!(host.calls(), vec!["word_search_text"]);
    let plan = agent.current_plan("s2").unwrap();
    assert_eq!(plan.steps[1].status, StepStatus::Skipped);
    assert_eq!(agent.phase("s2"), Some(ConversationPhase::Completed));
}

#[tokio::test]
async fn test_phase_changes_are_published_in_order() {
    let agent = agent();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    agent.subscribe(move |change| sink.lock().unwrap().push(change.to));

    agent.handle_message("s2", "replace A with B");
    agent
        .confirm_and_execute("s2", Arc::new(FakeDocument::new()), None, ExecutionMode::Normal)
        .await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ConversationPhase::Planning,
            ConversationPhase::AwaitingConfirmation,
            ConversationPhase::Executing,
            ConversationPhase::Completed,
        ]
    );
}

// ============================================================================
// Scenario 3: failed high-risk step halts the plan
// ============================================================================

fn three_step_review() -> ReviewResult {
    let issue = |id: &str, op: &str| ReviewIssue {
        id: id.to_string(),
        description: format!("Resolve {id}"),
        location: None,
        suggested_operations: vec![op.to_string()],
    };
    ReviewResult {
        issues: vec![
            issue("issue-1", "word_apply_style"),
            issue("issue-2", "word_replace_text"),
            issue("issue-3", "word_add_comment"),
        ],
        summary: Some("Three review findings".to_string()),
    }
}

#[tokio::test]
async fn test_high_risk_failure_halts_plan() {
    let agent = agent();
    let AgentReply::PlanProposed { plan, .. } =
        agent.plan_review_issues("s3", &three_step_review(), "apply the review")
    else {
        panic!("expected a plan");
    };
    assert_eq!(plan.steps[1].risk_level, RiskLevel::High);
    assert_eq!(plan.steps[2].source_issue_id.as_deref(), Some("issue-3"));

    let host = Arc::new(FakeDocument::new().failing("word_replace_text"));
    let report = agent
        .confirm_and_execute("s3", host.clone(), None, ExecutionMode::Normal)
        .await;

    assert!(!report.success);
    assert!(!report.cancelled);
    assert_eq!(report.completed_count, 2);
    assert_eq!(report.halted_at.as_deref(), Some("step-2"));
    assert_eq!(host.calls().len(), 2);

    let session = agent.current_session("s3").unwrap();
    let plan = session.plan.unwrap();
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert_eq!(plan.steps[1].status, StepStatus::Failed);
    assert_eq!(plan.steps[2].status, StepStatus::Pending);
    assert!(session.error.unwrap().contains("step-2"));
    assert_eq!(session.phase, ConversationPhase::AwaitingConfirmation);
}

#[tokio::test]
async fn test_halted_plan_resumes_remaining_steps() {
    let agent = agent();
    agent.plan_review_issues("s3", &three_step_review(), "apply the review");
    let failing: Arc<dyn OperationExecutor> =
        Arc::new(FakeDocument::new().failing("word_replace_text"));
    agent
        .confirm_and_execute("s3", failing, None, ExecutionMode::Normal)
        .await;

    let host = Arc::new(FakeDocument::new());
    let report = agent
        .confirm_and_execute("s3", host.clone(), None, ExecutionMode::Normal)
        .await;

    assert!(report.success);
    assert_eq!(report.completed_count, 1);
    assert_eq!(host.calls(), vec!["word_add_comment"]);
    let session = agent.current_session("s3").unwrap();
    assert_eq!(session.phase, ConversationPhase::Completed);
    assert!(session.error.is_none());
}
