//! Copilot Agent
//!
//! Session-level facade over the plan-mode components. Drives a session
//! through its phases:
//!
//! ```text
//! message -> (Clarifying -> answer)* -> Planning -> AwaitingConfirmation
//!         -> confirm -> Executing (<-> Paused) -> Completed | Cancelled
//! ```
//!
//! A plan halted by a failed high-risk step is returned to
//! `AwaitingConfirmation` (via the Executing -> Planning re-plan edge) with the
//! session error set; confirming again runs the remaining pending steps.
//!
//! Phase listeners run after the store lock is released, so they may call
//! back into the agent. While a plan runs, each step's progress is written
//! back to the session as it happens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use office_copilot_core::{OperationExecutor, StepConfirmer};

use crate::models::plan::{Plan, PlanStatus, PlanStep, ResultKind, StepResult};
use crate::models::session::{
    ClarificationAnswer, ClarificationQuestion, ConversationPhase, PhaseChange, Session,
};
use crate::models::settings::{CopilotConfig, ExecutorConfig};
use crate::services::audit::AuditLog;
use crate::services::plan_mode::{
    ClarificationEngine, ConversationStore, Decomposer, ExecutionControl, ExecutionMode,
    ExecutionObserver, ExecutionReport, ReviewResult, StepExecutor, UndoReport,
};
use crate::services::preview::{PlanPreview, PreviewGenerator};
use crate::services::tools::{CacheStats, CachedOperationExecutor, ToolResultCache};
use crate::utils::error::AppResult;

/// What the agent wants from the user next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentReply {
    NeedsClarification { question: ClarificationQuestion },
    PlanProposed { plan: Plan, preview: PlanPreview },
    NotActionable { reason: String },
}

impl AgentReply {
    fn not_actionable(reason: impl Into<String>) -> Self {
        AgentReply::NotActionable {
            reason: reason.into(),
        }
    }
}

type SharedStore = Arc<Mutex<ConversationStore>>;
type SharedExecutor = Arc<tokio::sync::Mutex<StepExecutor>>;

/// Run `f` against the locked store, then dispatch any phase changes it
/// queued once the lock is gone.
fn with_store<R>(store: &Mutex<ConversationStore>, f: impl FnOnce(&mut ConversationStore) -> R) -> R {
    let (value, notifications) = {
        let mut guard = store.lock().unwrap_or_else(PoisonError::into_inner);
        let value = f(&mut guard);
        (value, guard.take_notifications())
    };
    notifications.dispatch();
    value
}

pub struct CopilotAgent {
    store: SharedStore,
    clarifier: ClarificationEngine,
    decomposer: Decomposer,
    preview: Arc<PreviewGenerator>,
    cache: Arc<ToolResultCache>,
    executor_config: ExecutorConfig,
    controls: Mutex<HashMap<String, ExecutionControl>>,
    executors: Mutex<HashMap<String, SharedExecutor>>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    audit: AuditLog,
}

impl CopilotAgent {
    pub fn new(config: CopilotConfig) -> AppResult<Self> {
        let preview = Arc::new(PreviewGenerator::new(config.risk));
        let cache = Arc::new(ToolResultCache::new(config.cache)?);
        let clarifier = ClarificationEngine::new(config.clarification, preview.clone())?;
        let decomposer = Decomposer::new(config.decomposer, preview.clone())?;

        Ok(Self {
            store: Arc::new(Mutex::new(ConversationStore::new())),
            clarifier,
            decomposer,
            preview,
            cache,
            executor_config: config.executor,
            controls: Mutex::new(HashMap::new()),
            executors: Mutex::new(HashMap::new()),
            observer: None,
            audit: AuditLog::default(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register a listener for phase changes in every session.
    pub fn subscribe(&self, listener: impl Fn(&PhaseChange) + Send + Sync + 'static) {
        self.with_store(|store| store.subscribe(Arc::new(listener)));
    }

    // ========================================================================
    // Conversation
    // ========================================================================

    /// Take a new request: ask a question, propose a plan, or decline.
    pub fn handle_message(&self, session_id: &str, text: &str) -> AgentReply {
        self.with_store(|store| {
            if let Err(reply) = Self::prepare_for_request(store, session_id) {
                return reply;
            }
            store.set_original_intent(session_id, text);

            if self.clarifier.needs_clarification(text) {
                let question = self.clarifier.generate_question(text);
                store.transition(session_id, ConversationPhase::Clarifying);
                store.add_question(session_id, question.clone());
                return AgentReply::NeedsClarification { question };
            }

            match self.decomposer.decompose(text) {
                Some(plan) => self.propose(store, session_id, plan),
                None => AgentReply::not_actionable("No plan matches this request"),
            }
        })
    }

    /// Record an answer; ask the next question or propose a plan.
    pub fn answer_clarification(
        &self,
        session_id: &str,
        question_id: &str,
        answer: ClarificationAnswer,
    ) -> AgentReply {
        self.with_store(|store| {
            if store.phase(session_id) != Some(ConversationPhase::Clarifying) {
                warn!(session_id, "No clarification pending");
                return AgentReply::not_actionable("No clarification is pending");
            }
            if !store.answer_question(session_id, question_id, &answer) {
                return AgentReply::not_actionable("The answer was not accepted");
            }

            let Some(session) = store.session(session_id) else {
                return AgentReply::not_actionable("Unknown session");
            };
            if let Some(next) = session.unanswered_questions().find(|q| q.required) {
                return AgentReply::NeedsClarification {
                    question: next.clone(),
                };
            }

            let answered = session.answered_questions();
            let enhanced = self
                .clarifier
                .build_enhanced_intent(&session.original_intent, &answered);
            store.set_context_summary(session_id, &enhanced);

            let plan = self.decomposer.decompose(&enhanced).or_else(|| {
                let operations = self.clarifier.recommended_operations(&answered);
                self.decomposer.from_operations(&enhanced, &operations)
            });
            match plan {
                Some(plan) => self.propose(store, session_id, plan),
                None => {
                    store.transition(session_id, ConversationPhase::Initial);
                    AgentReply::not_actionable("No plan matches the clarified request")
                }
            }
        })
    }

    /// Propose one step per issue from an external document review.
    pub fn plan_review_issues(
        &self,
        session_id: &str,
        review: &ReviewResult,
        intent: &str,
    ) -> AgentReply {
        self.with_store(|store| {
            if let Err(reply) = Self::prepare_for_request(store, session_id) {
                return reply;
            }
            store.set_original_intent(session_id, intent);

            let plan = self.decomposer.decompose_from_review_results(review, intent);
            if plan.steps.is_empty() {
                return AgentReply::not_actionable("The review reported no issues");
            }
            self.propose(store, session_id, plan)
        })
    }

    /// Bring a session back to `Initial` for a new request. Sessions that
    /// already moved past `Initial` are restarted, keeping preferences.
    fn prepare_for_request(store: &mut ConversationStore, session_id: &str) -> Result<(), AgentReply> {
        let phase = store.get_or_create(session_id).phase;
        match phase {
            ConversationPhase::Initial => Ok(()),
            ConversationPhase::Executing | ConversationPhase::Paused => Err(
                AgentReply::not_actionable("A plan is already executing in this session"),
            ),
            _ => {
                let preferences = store
                    .session(session_id)
                    .map(|s| s.preferences.clone())
                    .unwrap_or_default();
                store.create_session(Some(session_id));
                if let Some(session) = store.session_mut(session_id) {
                    session.preferences = preferences;
                }
                Ok(())
            }
        }
    }

    fn propose(&self, store: &mut ConversationStore, session_id: &str, plan: Plan) -> AgentReply {
        if !store.transition(session_id, ConversationPhase::Planning) {
            return AgentReply::not_actionable("The session cannot start planning");
        }
        let preview = self.preview.preview_plan(&plan);
        store.attach_plan(session_id, plan.clone());
        store.transition(session_id, ConversationPhase::AwaitingConfirmation);
        info!(
            session_id,
            plan_id = %plan.id,
            overall_risk = %preview.overall_risk,
            "Proposed plan"
        );
        AgentReply::PlanProposed { plan, preview }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Confirm the session's plan and run it.
    ///
    /// `RecordOnly` stages results without touching the document and leaves
    /// the session awaiting confirmation. Calls on unknown sessions, or
    /// sessions without a confirmable plan, return an empty report.
    pub async fn confirm_and_execute(
        &self,
        session_id: &str,
        executor: Arc<dyn OperationExecutor>,
        confirmer: Option<Arc<dyn StepConfirmer>>,
        mode: ExecutionMode,
    ) -> ExecutionReport {
        let Some((mut plan, control)) = self.begin_execution(session_id, mode) else {
            return ExecutionReport::empty(mode);
        };

        let cached: Arc<dyn OperationExecutor> =
            Arc::new(CachedOperationExecutor::new(executor, self.cache.clone()));
        let step_executor = self.step_executor(session_id, cached.clone(), control);

        let report = {
            let mut runner = step_executor.lock().await;
            runner.set_executor(cached);
            runner.set_confirmer(confirmer);
            runner.run(&mut plan, mode).await
        };

        self.audit.record_results(session_id, &plan.id, &report.results);
        if mode == ExecutionMode::Normal {
            self.finish_execution(session_id, &plan, &report);
        }
        report
    }

    fn begin_execution(&self, session_id: &str, mode: ExecutionMode) -> Option<(Plan, ExecutionControl)> {
        self.with_store(|store| {
            let Some(phase) = store.phase(session_id) else {
                warn!(session_id, "Unknown conversation session");
                return None;
            };
            if store.plan(session_id).is_none() {
                warn!(session_id, "No plan to execute");
                return None;
            }
            let ready = matches!(
                phase,
                ConversationPhase::Planning | ConversationPhase::AwaitingConfirmation
            );
            if !ready {
                warn!(session_id, %phase, "Plan is not awaiting confirmation");
                return None;
            }

            let control = self.control(session_id);
            match mode {
                ExecutionMode::RecordOnly => {
                    if phase == ConversationPhase::Planning {
                        store.transition(session_id, ConversationPhase::AwaitingConfirmation);
                    }
                }
                ExecutionMode::Normal => {
                    if !store.fast_confirm(session_id) {
                        return None;
                    }
                    control.reset();
                    store.set_error(session_id, None);
                    if let Some(plan) = store.session_mut(session_id).and_then(|s| s.plan.as_mut()) {
                        plan.set_status(PlanStatus::Confirmed);
                    }
                }
            }
            let plan = store.plan(session_id).cloned()?;
            Some((plan, control))
        })
    }

    fn finish_execution(&self, session_id: &str, plan: &Plan, report: &ExecutionReport) {
        self.with_store(|store| {
            if store.plan(session_id).map(|p| p.id.as_str()) != Some(plan.id.as_str()) {
                warn!(session_id, plan_id = %plan.id, "Session moved on while the plan ran");
                return;
            }

            let phase = store.phase(session_id);
            if phase == Some(ConversationPhase::Cancelled) {
                return;
            }
            if phase == Some(ConversationPhase::Paused) {
                store.transition(session_id, ConversationPhase::Executing);
            }

            if report.cancelled {
                store.transition(session_id, ConversationPhase::Cancelled);
            } else if let Some(step_id) = &report.halted_at {
                let message = report
                    .results
                    .iter()
                    .find(|r| &r.step_id == step_id)
                    .map(|r| r.message.clone())
                    .unwrap_or_default();
                store.set_error(session_id, Some(format!("{step_id} failed: {message}")));
                store.transition(session_id, ConversationPhase::Planning);
                store.transition(session_id, ConversationPhase::AwaitingConfirmation);
            } else {
                store.transition(session_id, ConversationPhase::Completed);
            }
        });
    }

    pub fn pause(&self, session_id: &str) -> bool {
        self.with_store(|store| {
            if !store.transition(session_id, ConversationPhase::Paused) {
                return false;
            }
            self.control(session_id).pause();
            true
        })
    }

    pub fn resume(&self, session_id: &str) -> bool {
        self.with_store(|store| {
            if store.phase(session_id) != Some(ConversationPhase::Paused)
                || !store.transition(session_id, ConversationPhase::Executing)
            {
                return false;
            }
            self.control(session_id).resume();
            true
        })
    }

    /// Cancel the session. A running plan stops before its next step.
    pub fn cancel(&self, session_id: &str) -> bool {
        self.with_store(|store| {
            if !store.transition(session_id, ConversationPhase::Cancelled) {
                return false;
            }
            self.control(session_id).cancel();
            true
        })
    }

    /// Revert up to `count` of the session's most recent undoable steps.
    pub async fn undo(&self, session_id: &str, count: usize) -> UndoReport {
        let existing = self
            .executors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned();
        let Some(step_executor) = existing else {
            warn!(session_id, "Nothing to undo");
            return UndoReport::default();
        };

        let report = step_executor.lock().await.undo(count).await;
        if !report.undone.is_empty() {
            // Reverted edits can make any cached read stale
            self.cache.clear();
        }
        info!(
            session_id,
            undone = report.undone.len(),
            errors = report.errors.len(),
            "Undo finished"
        );
        report
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn current_plan(&self, session_id: &str) -> Option<Plan> {
        self.with_store(|store| store.plan(session_id).cloned())
    }

    pub fn current_session(&self, session_id: &str) -> Option<Session> {
        self.with_store(|store| store.session(session_id).cloned())
    }

    pub fn phase(&self, session_id: &str) -> Option<ConversationPhase> {
        self.with_store(|store| store.phase(session_id))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &Arc<ToolResultCache> {
        &self.cache
    }

    pub fn preview_generator(&self) -> &Arc<PreviewGenerator> {
        &self.preview
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        self.executors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        self.with_store(|store| store.clear_session(session_id))
    }

    fn with_store<R>(&self, f: impl FnOnce(&mut ConversationStore) -> R) -> R {
        with_store(&self.store, f)
    }

    fn control(&self, session_id: &str) -> ExecutionControl {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    fn step_executor(
        &self,
        session_id: &str,
        executor: Arc<dyn OperationExecutor>,
        control: ExecutionControl,
    ) -> SharedExecutor {
        self.executors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let sync = SessionPlanSync {
                    store: self.store.clone(),
                    session_id: session_id.to_string(),
                    forward: self.observer.clone(),
                };
                let runner = StepExecutor::new(executor, self.executor_config.clone())
                    .with_control(control)
                    .with_observer(Arc::new(sync));
                Arc::new(tokio::sync::Mutex::new(runner))
            })
            .clone()
    }
}

// ============================================================================
// Live Plan Sync
// ============================================================================

/// Writes a running plan's progress back into its session, then forwards
/// each event to the agent's observer.
///
/// Step events only land while the stored plan is `Confirmed` or `Executing`
/// and the step id matches its slot, so a plan that replaced the running one
/// (after a cancel and a new request) is never touched.
struct SessionPlanSync {
    store: SharedStore,
    session_id: String,
    forward: Option<Arc<dyn ExecutionObserver>>,
}

impl SessionPlanSync {
    fn write_step(&self, step: &PlanStep, cursor: usize, executed: bool) {
        with_store(&self.store, |store| {
            let Some(session) = store.session_mut(&self.session_id) else {
                return;
            };
            let Some(plan) = session.plan.as_mut() else {
                return;
            };
            if !matches!(plan.status, PlanStatus::Confirmed | PlanStatus::Executing) {
                return;
            }
            let Some(slot) = plan.steps.get_mut(step.index).filter(|s| s.id == step.id) else {
                return;
            };
            *slot = step.clone();
            plan.set_status(PlanStatus::Executing);
            plan.advance_to(cursor);
            session.touch();
            if executed {
                store.mark_step_executed(&self.session_id, &step.id);
            }
        });
    }

    fn write_plan(&self, plan: &Plan) {
        with_store(&self.store, |store| {
            let Some(session) = store.session_mut(&self.session_id) else {
                return;
            };
            if session.plan.as_ref().map(|p| p.id.as_str()) == Some(plan.id.as_str()) {
                session.plan = Some(plan.clone());
                session.touch();
            }
        });
    }

    fn finished(&self, step: &PlanStep, result: &StepResult) {
        let executed = result.kind == ResultKind::Executed && result.success;
        self.write_step(step, step.index + 1, executed);
    }
}

impl ExecutionObserver for SessionPlanSync {
    fn on_step_start(&self, step: &PlanStep) {
        self.write_step(step, step.index, false);
        if let Some(observer) = &self.forward {
            observer.on_step_start(step);
        }
    }

    fn on_step_complete(&self, step: &PlanStep, result: &StepResult) {
        self.finished(step, result);
        if let Some(observer) = &self.forward {
            observer.on_step_complete(step, result);
        }
    }

    fn on_step_failed(&self, step: &PlanStep, result: &StepResult) {
        self.finished(step, result);
        if let Some(observer) = &self.forward {
            observer.on_step_failed(step, result);
        }
    }

    fn on_step_skipped(&self, step: &PlanStep, result: &StepResult) {
        self.finished(step, result);
        if let Some(observer) = &self.forward {
            observer.on_step_skipped(step, result);
        }
    }

    fn on_plan_complete(&self, plan: &Plan, report: &ExecutionReport) {
        self.write_plan(plan);
        if let Some(observer) = &self.forward {
            observer.on_plan_complete(plan, report);
        }
    }

    fn on_plan_cancelled(&self, plan: &Plan, report: &ExecutionReport) {
        self.write_plan(plan);
        if let Some(observer) = &self.forward {
            observer.on_plan_cancelled(plan, report);
        }
    }

    fn on_plan_halted(&self, plan: &Plan, report: &ExecutionReport) {
        self.write_plan(plan);
        if let Some(observer) = &self.forward {
            observer.on_plan_halted(plan, report);
        }
    }
}
