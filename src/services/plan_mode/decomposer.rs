//! Plan Decomposer
//!
//! Turns a request into an ordered Plan using a template library:
//! - `decompose`: keyword/pattern template match, with named captures filling
//!   `{placeholders}` in step descriptions and arguments
//! - `decompose_from_review_results`: one step per externally supplied issue
//! - `from_operations`: one step per recommended operation name
//!
//! Step risk, undo-ability and time estimates come from the preview catalog.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use office_copilot_core::OperationArgs;

use crate::models::plan::{Plan, PlanStep, StepStatus};
use crate::models::settings::{DecomposerConfig, PlanTemplate, StepBlueprint};
use crate::services::preview::PreviewGenerator;
use crate::utils::error::AppResult;

/// An issue reported by an external document review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIssue {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Candidate operations, best first
    #[serde(default)]
    pub suggested_operations: Vec<String>,
}

/// Output of an external document review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub issues: Vec<ReviewIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

struct CompiledTemplate {
    template: PlanTemplate,
    keywords: Vec<String>,
    pattern: Option<Regex>,
}

impl CompiledTemplate {
    /// Named captures when this template applies to `text`.
    fn captures(&self, text: &str, lower: &str) -> Option<HashMap<String, String>> {
        if !self.keywords.iter().any(|k| lower.contains(k.as_str())) {
            return None;
        }
        let Some(pattern) = &self.pattern else {
            return Some(HashMap::new());
        };
        let caps = pattern.captures(text)?;
        Some(
            pattern
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().trim().to_string()))
                })
                .collect(),
        )
    }
}

pub struct Decomposer {
    templates: Vec<CompiledTemplate>,
    config: DecomposerConfig,
    preview: Arc<PreviewGenerator>,
    /// `{name}` placeholders in template text
    placeholder: Regex,
}

impl Decomposer {
    pub fn new(config: DecomposerConfig, preview: Arc<PreviewGenerator>) -> AppResult<Self> {
        let templates = config
            .templates
            .iter()
            .map(|t| -> AppResult<CompiledTemplate> {
                Ok(CompiledTemplate {
                    template: t.clone(),
                    keywords: t.keywords.iter().map(|k| k.to_lowercase()).collect(),
                    pattern: t.pattern.as_deref().map(Regex::new).transpose()?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            templates,
            config,
            preview,
            placeholder: Regex::new(r"\{(\w+)\}")?,
        })
    }

    /// Whether `text` looks like a multi-step request.
    pub fn can_decompose(&self, text: &str) -> bool {
        self.match_template(text).is_some()
            || text.chars().count() > self.config.complexity_threshold_chars
            || self.count_markers(text) >= self.config.min_marker_count.max(1)
    }

    /// Plan for the first matching template, or `None`.
    pub fn decompose(&self, text: &str) -> Option<Plan> {
        let (compiled, captures) = self.match_template(text)?;
        let template = &compiled.template;
        let steps = template
            .steps
            .iter()
            .map(|bp| self.step_from_blueprint(bp, &captures))
            .collect();

        let plan = Plan::new(
            self.fill(&template.title, &captures),
            self.fill(&template.description, &captures),
            steps,
        );
        info!(
            plan_id = %plan.id,
            template = %template.id,
            steps = plan.steps.len(),
            "Decomposed request into plan"
        );
        Some(plan)
    }

    /// One step per review issue, keeping a reference back to the issue.
    pub fn decompose_from_review_results(&self, review: &ReviewResult, intent: &str) -> Plan {
        let steps = review
            .issues
            .iter()
            .map(|issue| {
                let operation = issue
                    .suggested_operations
                    .first()
                    .cloned()
                    .unwrap_or_else(|| self.config.review_fallback_operation.clone());

                let mut args = OperationArgs::new();
                args.insert("issueId".to_string(), Value::String(issue.id.clone()));
                args.insert(
                    "description".to_string(),
                    Value::String(issue.description.clone()),
                );
                if let Some(location) = &issue.location {
                    args.insert("location".to_string(), Value::String(location.clone()));
                }

                let mut step = self.build_step(&issue.description, &operation, args, None);
                step.source_issue_id = Some(issue.id.clone());
                step.location_hint = issue.location.clone();
                step
            })
            .collect();

        let description = review
            .summary
            .clone()
            .unwrap_or_else(|| intent.to_string());
        let plan = Plan::new("Resolve review issues", description, steps);
        info!(
            plan_id = %plan.id,
            issues = review.issues.len(),
            "Built plan from review results"
        );
        plan
    }

    /// One argument-less step per operation name, or `None` if there are none.
    pub fn from_operations(&self, intent: &str, operations: &[String]) -> Option<Plan> {
        if operations.is_empty() {
            return None;
        }
        let steps = operations
            .iter()
            .map(|op| {
                let description = self
                    .preview
                    .preview(op, &OperationArgs::new(), None)
                    .description;
                self.build_step(&description, op, OperationArgs::new(), None)
            })
            .collect();
        let plan = Plan::new("Planned changes", intent, steps);
        debug!(plan_id = %plan.id, "Built plan from recommended operations");
        Some(plan)
    }

    fn match_template(&self, text: &str) -> Option<(&CompiledTemplate, HashMap<String, String>)> {
        let lower = text.to_lowercase();
        self.templates
            .iter()
            .find_map(|t| t.captures(text, &lower).map(|caps| (t, caps)))
    }

    /// Count sequencing phrases; longer markers are consumed first so
    /// " and then " is not also counted as " then ".
    fn count_markers(&self, text: &str) -> usize {
        let mut markers: Vec<String> = self
            .config
            .multi_step_markers
            .iter()
            .map(|m| m.to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        markers.sort_by_key(|m| std::cmp::Reverse(m.len()));

        let mut rest = format!(" {} ", text.to_lowercase());
        let mut count = 0;
        for marker in &markers {
            count += rest.matches(marker.as_str()).count();
            rest = rest.replace(marker.as_str(), " | ");
        }
        count
    }

    fn step_from_blueprint(&self, bp: &StepBlueprint, captures: &HashMap<String, String>) -> PlanStep {
        let args = bp
            .args
            .iter()
            .map(|(k, v)| (k.clone(), self.fill_value(v, captures)))
            .collect();
        self.build_step(
            &self.fill(&bp.description, captures),
            &bp.operation_name,
            args,
            bp.estimated_time_ms,
        )
    }

    fn build_step(
        &self,
        description: &str,
        operation_name: &str,
        operation_args: OperationArgs,
        estimated_time_ms: Option<u64>,
    ) -> PlanStep {
        let profile = self.preview.profile(operation_name);
        PlanStep {
            id: String::new(),
            index: 0,
            description: description.to_string(),
            operation_name: operation_name.to_string(),
            operation_args,
            status: StepStatus::Pending,
            risk_level: profile.risk_level,
            can_undo: profile.can_undo,
            needs_confirmation: profile.risk_level.requires_confirmation(),
            estimated_time_ms: estimated_time_ms
                .unwrap_or_else(|| self.preview.estimate_ms(operation_name)),
            result: None,
            source_issue_id: None,
            location_hint: None,
        }
    }

    /// Substitute captures in one pass; captured text is never re-scanned,
    /// and unknown placeholders are left as written.
    fn fill(&self, text: &str, captures: &HashMap<String, String>) -> String {
        self.placeholder
            .replace_all(text, |caps: &regex::Captures<'_>| {
                captures
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn fill_value(&self, value: &Value, captures: &HashMap<String, String>) -> Value {
        match value {
            Value::String(s) => Value::String(self.fill(s, captures)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.fill_value(v, captures)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.fill_value(v, captures)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
