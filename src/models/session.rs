//! Conversation Session Models
//!
//! Per-session conversation state: the current phase, outstanding
//! clarification questions, the attached plan, and user preferences.
//!
//! Phase changes go through `Session::transition`, which only accepts the
//! edges listed in `ConversationPhase::allowed_transitions`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use office_copilot_core::RiskLevel;

use super::plan::Plan;

// ============================================================================
// Conversation Phase
// ============================================================================

/// Conversation phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Initial,
    Clarifying,
    Planning,
    AwaitingConfirmation,
    Executing,
    Completed,
    Paused,
    Cancelled,
}

impl ConversationPhase {
    /// Phases reachable from this one in a single transition.
    pub fn allowed_transitions(&self) -> &'static [ConversationPhase] {
        use ConversationPhase::*;
        match self {
            Initial => &[Clarifying, Planning, Executing, Completed],
            Clarifying => &[Initial, Planning, Executing, Cancelled],
            Planning => &[AwaitingConfirmation, Cancelled],
            AwaitingConfirmation => &[Executing, Planning, Cancelled],
            Executing => &[Completed, Paused, Cancelled, Planning],
            Paused => &[Executing, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: ConversationPhase) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationPhase::Completed | ConversationPhase::Cancelled)
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationPhase::Initial => write!(f, "initial"),
            ConversationPhase::Clarifying => write!(f, "clarifying"),
            ConversationPhase::Planning => write!(f, "planning"),
            ConversationPhase::AwaitingConfirmation => write!(f, "awaiting_confirmation"),
            ConversationPhase::Executing => write!(f, "executing"),
            ConversationPhase::Completed => write!(f, "completed"),
            ConversationPhase::Paused => write!(f, "paused"),
            ConversationPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Emitted after every successful phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseChange {
    pub session_id: String,
    pub from: ConversationPhase,
    pub to: ConversationPhase,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Clarification Types
// ============================================================================

/// Response type expected for a clarification question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    FreeText,
    YesNo,
}

/// A selectable answer, mapped to the operations it recommends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationOption {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub recommended_operations: Vec<String>,
    /// Highest risk among the recommended operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

/// A structured question that disambiguates a vague request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationQuestion {
    pub id: String,
    pub question: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<ClarificationOption>,
    pub required: bool,
    pub answered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
    /// Every selected option (multiple choice)
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's answer to a clarification question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ClarificationAnswer {
    /// One option id (single choice, yes/no)
    Option(String),
    /// Several option ids (multiple choice)
    Options(Vec<String>),
    /// Free-form text
    Text(String),
}

impl ClarificationQuestion {
    pub fn option(&self, option_id: &str) -> Option<&ClarificationOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Record the answer. A question can only be answered once, and option
    /// answers must name existing options.
    pub fn apply_answer(&mut self, answer: &ClarificationAnswer) -> bool {
        if self.answered {
            return false;
        }
        match answer {
            ClarificationAnswer::Option(id) => {
                let Some(label) = self.option(id).map(|o| o.label.clone()) else {
                    return false;
                };
                self.answer = Some(label);
                self.selected_option_id = Some(id.clone());
                self.selected_option_ids = vec![id.clone()];
            }
            ClarificationAnswer::Options(ids) => {
                if ids.is_empty() || ids.iter().any(|id| self.option(id).is_none()) {
                    return false;
                }
                let labels: Vec<String> = ids
                    .iter()
                    .filter_map(|id| self.option(id).map(|o| o.label.clone()))
                    .collect();
                self.answer = Some(labels.join(", "));
                self.selected_option_id = ids.first().cloned();
                self.selected_option_ids = ids.clone();
            }
            ClarificationAnswer::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return false;
                }
                self.answer = Some(text.to_string());
            }
        }
        self.answered = true;
        true
    }

    /// Options the user picked, in selection order.
    pub fn selected_options(&self) -> Vec<&ClarificationOption> {
        self.selected_option_ids
            .iter()
            .filter_map(|id| self.option(id))
            .collect()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Conversation session tracking all state across phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub phase: ConversationPhase,
    #[serde(default)]
    pub original_intent: String,
    #[serde(default)]
    pub clarifications: Vec<ClarificationQuestion>,
    pub plan: Option<Plan>,
    #[serde(default)]
    pub executed_step_ids: Vec<String>,
    #[serde(default)]
    pub context_summary: String,
    #[serde(default)]
    pub preferences: HashMap<String, Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            phase: ConversationPhase::Initial,
            original_intent: String::new(),
            clarifications: Vec::new(),
            plan: None,
            executed_step_ids: Vec::new(),
            context_summary: String::new(),
            preferences: HashMap::new(),
            error: None,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Move to `target` if the transition table allows it.
    ///
    /// On rejection the session is left untouched.
    pub fn transition(&mut self, target: ConversationPhase) -> bool {
        if !self.phase.can_transition_to(target) {
            return false;
        }
        self.phase = target;
        self.touch();
        true
    }

    pub fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }

    pub fn unanswered_questions(&self) -> impl Iterator<Item = &ClarificationQuestion> {
        self.clarifications.iter().filter(|q| !q.answered)
    }

    pub fn answered_questions(&self) -> Vec<ClarificationQuestion> {
        self.clarifications
            .iter()
            .filter(|q| q.answered)
            .cloned()
            .collect()
    }

    /// Whether every required question has an answer.
    pub fn clarification_complete(&self) -> bool {
        self.clarifications
            .iter()
            .all(|q| q.answered || !q.required)
    }
}
