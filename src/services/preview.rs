//! Operation Preview
//!
//! Pure mapping from an operation (name + args) to what the user should know
//! before it runs: risk, undo-ability, scope, time, warnings. Plan previews
//! aggregate the per-step previews into an overall verdict.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use office_copilot_core::{OperationArgs, RiskLevel};

use crate::models::plan::Plan;
use crate::models::settings::{OperationProfile, OperationType, RiskCatalog};

/// Number of independently high-risk steps that escalates a plan to critical.
const HIGH_RISK_ESCALATION_COUNT: usize = 3;

/// Argument keys treated as formatting changes.
const FORMAT_KEYS: &[&str] = &[
    "font",
    "fontName",
    "fontSize",
    "size",
    "bold",
    "italic",
    "underline",
    "color",
    "highlight",
    "alignment",
    "lineSpacing",
    "spaceBefore",
    "spaceAfter",
    "indent",
    "style",
    "theme",
];

/// Argument keys naming where an operation applies, in priority order.
const SCOPE_KEYS: &[&str] = &["scope", "range", "target", "location"];

/// A single formatting property an operation will set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatChange {
    pub property: String,
    pub value: String,
}

/// Preview of one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPreview {
    pub operation_name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub risk_level: RiskLevel,
    pub can_undo: bool,
    pub estimated_time_ms: u64,
    pub affected_scope: String,
    pub warnings: Vec<String>,
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_changes: Option<Vec<FormatChange>>,
}

/// Aggregated preview of a whole plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPreview {
    pub plan_id: String,
    pub steps: Vec<OperationPreview>,
    pub overall_risk: RiskLevel,
    pub total_estimated_ms: u64,
    pub warnings: Vec<String>,
    pub requires_confirmation: bool,
    pub critical_count: usize,
    pub high_count: usize,
    pub irreversible_count: usize,
}

/// Maps operations to previews using a static risk catalog.
#[derive(Debug, Clone, Default)]
pub struct PreviewGenerator {
    catalog: RiskCatalog,
}

impl PreviewGenerator {
    pub fn new(catalog: RiskCatalog) -> Self {
        Self { catalog }
    }

    /// Catalog entry for `name`, or the medium/undoable/mixed default.
    pub fn profile(&self, name: &str) -> OperationProfile {
        self.catalog
            .operations
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn risk_level(&self, name: &str) -> RiskLevel {
        self.catalog
            .operations
            .get(name)
            .map(|p| p.risk_level)
            .unwrap_or_default()
    }

    /// Estimated duration: the catalog's value, else the class default.
    pub fn estimate_ms(&self, name: &str) -> u64 {
        let profile = self.profile(name);
        profile.estimated_time_ms.unwrap_or_else(|| {
            self.catalog
                .class_estimates
                .for_type(profile.operation_type)
        })
    }

    pub fn preview(
        &self,
        name: &str,
        args: &OperationArgs,
        description: Option<&str>,
    ) -> OperationPreview {
        let profile = self.profile(name);
        let facts = StepFacts {
            risk_level: profile.risk_level,
            can_undo: profile.can_undo,
            estimated_time_ms: self.estimate_ms(name),
            requires_confirmation: profile.risk_level.requires_confirmation(),
        };
        self.build_preview(name, args, description, &profile, facts)
    }

    fn build_preview(
        &self,
        name: &str,
        args: &OperationArgs,
        description: Option<&str>,
        profile: &OperationProfile,
        facts: StepFacts,
    ) -> OperationPreview {
        let description = description
            .map(str::to_string)
            .or_else(|| profile.description.clone())
            .unwrap_or_else(|| humanize_operation_name(name));

        let affected_scope = SCOPE_KEYS
            .iter()
            .find_map(|key| args.get(*key).map(value_to_text))
            .or_else(|| profile.affected_scope.clone())
            .unwrap_or_else(|| "document".to_string());

        let mut warnings = profile.warnings.clone();
        if !facts.can_undo {
            warnings.push("This operation cannot be undone".to_string());
        }
        if facts.risk_level == RiskLevel::Critical {
            warnings.push("Critical change: review carefully before confirming".to_string());
        }

        let format_changes: Vec<FormatChange> = FORMAT_KEYS
            .iter()
            .filter_map(|key| {
                args.get(*key).map(|v| FormatChange {
                    property: key.to_string(),
                    value: value_to_text(v),
                })
            })
            .collect();

        OperationPreview {
            operation_name: name.to_string(),
            description,
            operation_type: profile.operation_type,
            risk_level: facts.risk_level,
            can_undo: facts.can_undo,
            estimated_time_ms: facts.estimated_time_ms,
            affected_scope,
            warnings,
            requires_confirmation: facts.requires_confirmation,
            format_changes: (!format_changes.is_empty()).then_some(format_changes),
        }
    }

    /// Preview a plan as its steps will actually run: each step's own risk,
    /// undo flag, estimate and confirmation flag win over the catalog.
    pub fn preview_plan(&self, plan: &Plan) -> PlanPreview {
        let steps: Vec<OperationPreview> = plan
            .steps
            .iter()
            .map(|s| {
                let facts = StepFacts {
                    risk_level: s.risk_level,
                    can_undo: s.can_undo,
                    estimated_time_ms: s.estimated_time_ms,
                    requires_confirmation: s.needs_confirmation
                        || s.risk_level.requires_confirmation(),
                };
                let profile = self.profile(&s.operation_name);
                self.build_preview(
                    &s.operation_name,
                    &s.operation_args,
                    Some(&s.description),
                    &profile,
                    facts,
                )
            })
            .collect();

        let critical_count = steps
            .iter()
            .filter(|p| p.risk_level == RiskLevel::Critical)
            .count();
        let high_count = steps
            .iter()
            .filter(|p| p.risk_level == RiskLevel::High)
            .count();
        let irreversible_count = steps.iter().filter(|p| !p.can_undo).count();

        let mut overall_risk = steps
            .iter()
            .map(|p| p.risk_level)
            .max()
            .unwrap_or(RiskLevel::Low);
        if high_count >= HIGH_RISK_ESCALATION_COUNT {
            overall_risk = RiskLevel::Critical;
        }

        let mut warnings = Vec::new();
        if critical_count > 0 {
            warnings.push(format!("{critical_count} step(s) are critical risk"));
        }
        if high_count > 0 {
            warnings.push(format!("{high_count} step(s) are high risk"));
        }
        if irreversible_count > 0 {
            warnings.push(format!("{irreversible_count} step(s) cannot be undone"));
        }
        let mut seen = HashSet::new();
        for warning in steps.iter().flat_map(|p| p.warnings.iter()) {
            if seen.insert(warning.as_str()) {
                warnings.push(warning.clone());
            }
        }

        PlanPreview {
            plan_id: plan.id.clone(),
            total_estimated_ms: plan.total_estimated_ms(),
            requires_confirmation: overall_risk.requires_confirmation(),
            overall_risk,
            warnings,
            critical_count,
            high_count,
            irreversible_count,
            steps,
        }
    }
}

/// Risk facts a preview reports, from the catalog or from a planned step.
struct StepFacts {
    risk_level: RiskLevel,
    can_undo: bool,
    estimated_time_ms: u64,
    requires_confirmation: bool,
}

/// "word_apply_style" -> "Apply style (word)"
fn humanize_operation_name(name: &str) -> String {
    let mut parts = name.split('_');
    let namespace = parts.next().unwrap_or_default();
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return namespace.to_string();
    }
    let mut text = rest.join(" ");
    if let Some(first) = text.get(0..1) {
        text = format!("{}{}", first.to_uppercase(), &text[1..]);
    }
    format!("{text} ({namespace})")
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
