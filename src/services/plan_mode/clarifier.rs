//! Clarification Engine
//!
//! Decides whether a request is specific enough to act on, and if not,
//! produces a structured question whose options map to recommended operations.
//! Answers are folded back into the request text before decomposition.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::models::session::{ClarificationOption, ClarificationQuestion, QuestionType};
use crate::models::settings::{ClarificationConfig, ClarificationScenario};
use crate::services::preview::PreviewGenerator;
use crate::utils::error::AppResult;

pub struct ClarificationEngine {
    direct_patterns: Vec<Regex>,
    vague_patterns: Vec<Regex>,
    scenarios: Vec<ClarificationScenario>,
    fallback_question: String,
    preview: Arc<PreviewGenerator>,
}

impl ClarificationEngine {
    pub fn new(config: ClarificationConfig, preview: Arc<PreviewGenerator>) -> AppResult<Self> {
        let compile = |patterns: &[String]| -> AppResult<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| Regex::new(p).map_err(Into::into))
                .collect()
        };
        Ok(Self {
            direct_patterns: compile(&config.direct_patterns)?,
            vague_patterns: compile(&config.vague_patterns)?,
            scenarios: config.scenarios,
            fallback_question: config.fallback_question,
            preview,
        })
    }

    /// Whether `text` must be clarified before planning.
    ///
    /// Direct commands (explicit target and transformation) never need
    /// clarification. Blank text always does.
    pub fn needs_clarification(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return true;
        }
        if self.direct_patterns.iter().any(|p| p.is_match(text)) {
            return false;
        }
        let vague = self.vague_patterns.iter().any(|p| p.is_match(text));
        debug!(vague, "Checked request for clarification");
        vague
    }

    /// Question for the first scenario whose keyword occurs in `text`,
    /// else a generic free-text question.
    pub fn generate_question(&self, text: &str) -> ClarificationQuestion {
        let lower = text.to_lowercase();
        let scenario = self.scenarios.iter().find(|s| {
            s.keywords
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()))
        });

        let (question, question_type, options) = match scenario {
            Some(s) => {
                debug!(scenario = %s.id, "Matched clarification scenario");
                let options = s.options.iter().map(|o| self.with_risk(o)).collect();
                (s.question.clone(), s.question_type, options)
            }
            None => (self.fallback_question.clone(), QuestionType::FreeText, Vec::new()),
        };

        ClarificationQuestion {
            id: format!("clarify-{}", Uuid::new_v4()),
            question,
            question_type,
            options,
            required: true,
            answered: false,
            answer: None,
            selected_option_id: None,
            selected_option_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append the answered questions' chosen text to `original`.
    ///
    /// `"tidy this up"` + "Unify formatting" -> `"tidy this up: Unify formatting"`.
    pub fn build_enhanced_intent(&self, original: &str, answered: &[ClarificationQuestion]) -> String {
        let parts: Vec<&str> = answered
            .iter()
            .filter(|q| q.answered)
            .filter_map(|q| q.answer.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();
        if parts.is_empty() {
            return original.to_string();
        }
        format!("{}: {}", original.trim_end(), parts.join(", "))
    }

    /// Operations recommended by the selected options, de-duplicated in order.
    pub fn recommended_operations(&self, answered: &[ClarificationQuestion]) -> Vec<String> {
        let mut operations: Vec<String> = Vec::new();
        for option in answered.iter().flat_map(|q| q.selected_options()) {
            for op in &option.recommended_operations {
                if !operations.contains(op) {
                    operations.push(op.clone());
                }
            }
        }
        operations
    }

    fn with_risk(&self, option: &ClarificationOption) -> ClarificationOption {
        let risk_level = option
            .recommended_operations
            .iter()
            .map(|op| self.preview.risk_level(op))
            .max();
        ClarificationOption {
            risk_level,
            ..option.clone()
        }
    }
}
