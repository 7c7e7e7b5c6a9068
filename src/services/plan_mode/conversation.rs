//! Conversation State Store
//!
//! Owns every session and enforces the phase transition table. Clarification
//! answers, plan attachment and preference edits mutate a session without
//! changing its phase.
//!
//! Unknown session ids are a no-op: the call is logged and returns `false`.
//!
//! `fast_confirm` lets a caller confirm a plan while still in `Planning`. It
//! performs Planning -> AwaitingConfirmation -> Executing as two ordinary
//! table transitions inside one call, so listeners observe both edges. The
//! table has no direct Planning -> Executing edge.
//!
//! Transitions only queue their `PhaseChange`. The owner drains the queue with
//! `take_notifications` and dispatches it after releasing whatever lock guards
//! the store, so listeners may call back into the owner.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::plan::Plan;
use crate::models::session::{
    ClarificationAnswer, ClarificationQuestion, ConversationPhase, PhaseChange, Session,
};

/// Callback fired after each successful phase transition.
pub type PhaseListener = Arc<dyn Fn(&PhaseChange) + Send + Sync>;

/// Phase changes queued since the last drain, with the listeners to tell.
#[must_use = "queued phase changes reach listeners only through dispatch"]
pub struct PhaseNotifications {
    changes: Vec<PhaseChange>,
    listeners: Vec<PhaseListener>,
}

impl PhaseNotifications {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Fire every queued change at every listener, in transition order.
    pub fn dispatch(self) {
        for change in &self.changes {
            for listener in &self.listeners {
                listener(change);
            }
        }
    }
}

#[derive(Default)]
pub struct ConversationStore {
    sessions: HashMap<String, Session>,
    listeners: Vec<PhaseListener>,
    pending: Vec<PhaseChange>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session, replacing any existing one with the same id.
    pub fn create_session(&mut self, id: Option<&str>) -> String {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));
        self.sessions.insert(id.clone(), Session::new(id.clone()));
        info!(session_id = %id, "Created conversation session");
        id
    }

    pub fn get_or_create(&mut self, id: &str) -> &mut Session {
        self.sessions.entry(id.to_string()).or_insert_with(|| {
            info!(session_id = %id, "Created conversation session");
            Session::new(id)
        })
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        let session = self.sessions.get_mut(id);
        if session.is_none() {
            warn!(session_id = %id, "Unknown conversation session");
        }
        session
    }

    pub fn clear_session(&mut self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Cleared conversation session");
        }
        removed
    }

    pub fn phase(&self, id: &str) -> Option<ConversationPhase> {
        self.sessions.get(id).map(|s| s.phase)
    }

    /// Move a session to `target` if the transition table allows it.
    pub fn transition(&mut self, id: &str, target: ConversationPhase) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        let from = session.phase;
        if !session.transition(target) {
            warn!(session_id = %id, %from, to = %target, "Rejected phase transition");
            return false;
        }
        info!(session_id = %id, %from, to = %target, "Phase transition");

        self.pending.push(PhaseChange {
            session_id: id.to_string(),
            from,
            to: target,
            at: Utc::now(),
        });
        true
    }

    /// Confirm the current plan and enter `Executing`.
    ///
    /// From `Planning` this takes both table edges in one call; from
    /// `AwaitingConfirmation` it is a single transition.
    pub fn fast_confirm(&mut self, id: &str) -> bool {
        match self.phase(id) {
            Some(ConversationPhase::Planning) => {
                debug!(session_id = %id, "Fast-confirming plan from planning phase");
                self.transition(id, ConversationPhase::AwaitingConfirmation)
                    && self.transition(id, ConversationPhase::Executing)
            }
            Some(ConversationPhase::AwaitingConfirmation) => {
                self.transition(id, ConversationPhase::Executing)
            }
            Some(_) => false,
            None => {
                warn!(session_id = %id, "Unknown conversation session");
                false
            }
        }
    }

    pub fn add_question(&mut self, id: &str, question: ClarificationQuestion) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        session.clarifications.push(question);
        session.touch();
        true
    }

    /// Answer an outstanding question. Each question accepts one answer.
    pub fn answer_question(
        &mut self,
        id: &str,
        question_id: &str,
        answer: &ClarificationAnswer,
    ) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        let Some(question) = session
            .clarifications
            .iter_mut()
            .find(|q| q.id == question_id)
        else {
            warn!(session_id = %id, question_id, "Unknown clarification question");
            return false;
        };
        let applied = question.apply_answer(answer);
        if applied {
            session.touch();
        }
        applied
    }

    pub fn set_original_intent(&mut self, id: &str, intent: &str) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        session.original_intent = intent.to_string();
        session.touch();
        true
    }

    /// Attach (or replace) the session's plan without changing its phase.
    pub fn attach_plan(&mut self, id: &str, plan: Plan) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        debug!(session_id = %id, plan_id = %plan.id, "Attached plan");
        session.plan = Some(plan);
        session.executed_step_ids.clear();
        session.error = None;
        session.touch();
        true
    }

    pub fn plan(&self, id: &str) -> Option<&Plan> {
        self.sessions.get(id).and_then(|s| s.plan.as_ref())
    }

    pub fn set_preference(&mut self, id: &str, key: &str, value: Value) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        session.preferences.insert(key.to_string(), value);
        session.touch();
        true
    }

    pub fn mark_step_executed(&mut self, id: &str, step_id: &str) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        if !session.executed_step_ids.iter().any(|s| s == step_id) {
            session.executed_step_ids.push(step_id.to_string());
            session.touch();
        }
        true
    }

    pub fn set_error(&mut self, id: &str, error: Option<String>) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        session.error = error;
        session.touch();
        true
    }

    pub fn set_context_summary(&mut self, id: &str, summary: &str) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        session.context_summary = summary.to_string();
        session.touch();
        true
    }

    /// Register a listener for phase changes across all sessions.
    pub fn subscribe(&mut self, listener: PhaseListener) {
        self.listeners.push(listener);
    }

    /// Drain the queued phase changes for dispatch outside the store.
    pub fn take_notifications(&mut self) -> PhaseNotifications {
        let listeners = if self.pending.is_empty() {
            Vec::new()
        } else {
            self.listeners.clone()
        };
        PhaseNotifications {
            changes: std::mem::take(&mut self.pending),
            listeners,
        }
    }
}
