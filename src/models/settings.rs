//! Copilot Configuration
//!
//! The operation catalogs (risk, cache TTL, invalidation, clarification
//! scenarios, plan templates) are plain data so hosts can extend them as the
//! operation catalog grows. Each component is constructed from its own section.
//!
//! Defaults describe the built-in Word/Excel/PowerPoint operations. Names follow
//! a `<app>_<verb>_<object>` convention; the `<app>_` prefix is the namespace
//! used for coarse cache invalidation.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use office_copilot_core::{OperationArgs, RiskLevel};

use super::session::{ClarificationOption, QuestionType};
use crate::utils::error::{AppError, AppResult};

/// Config file names tried by `CopilotConfig::load_or_default`, in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["copilot.toml", "copilot.json"];

// ============================================================================
// Top-level Config
// ============================================================================

/// Complete configuration for every copilot component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    pub cache: CacheConfig,
    pub risk: RiskCatalog,
    pub clarification: ClarificationConfig,
    pub decomposer: DecomposerConfig,
    pub executor: ExecutorConfig,
}

impl CopilotConfig {
    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// Sections missing from the file keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            other => Err(AppError::config(format!(
                "unsupported config file extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Load `copilot.toml` or `copilot.json` from `dir`, or use defaults.
    pub fn load_or_default(dir: impl AsRef<Path>) -> Self {
        for name in CONFIG_FILE_NAMES {
            let path = dir.as_ref().join(name);
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded copilot config");
                    return config;
                }
                Err(e) => {
                    warn!(path = %path.display(), "Ignoring invalid copilot config: {e}");
                }
            }
        }
        Self::default()
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Tool result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results; oldest-inserted is evicted first
    pub max_entries: usize,
    pub default_ttl_ms: u64,
    /// TTL for names containing a `short_ttl_keywords` entry
    pub short_ttl_ms: u64,
    /// TTL for names containing a `long_ttl_keywords` entry
    pub long_ttl_ms: u64,
    pub short_ttl_keywords: Vec<String>,
    pub long_ttl_keywords: Vec<String>,
    /// Exact-name TTLs, checked before the keyword heuristics
    pub ttl_overrides: HashMap<String, u64>,
    /// Regexes selecting cacheable (read-class) operations
    pub read_patterns: Vec<String>,
    /// Regexes selecting invalidating (write-class) operations
    pub write_patterns: Vec<String>,
    /// Write operation name -> regexes of read operations it can affect
    pub invalidation_map: HashMap<String, Vec<String>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let invalidation_map = [
            (
                "word_apply_style",
                vec![r"^word_get_(document_structure|paragraphs|style_names)$", r"^word_get_selected"],
            ),
            ("word_format_text", vec![r"^word_get_selected", r"^word_get_paragraphs$"]),
            ("word_format_paragraph", vec![r"^word_get_selected", r"^word_get_paragraphs$"]),
            ("word_insert_text", vec![r"^word_get_", r"^word_search_"]),
            (
                "word_replace_text",
                vec![r"^word_get_(selected_text|paragraphs)$", r"^word_search_text$"],
            ),
            ("word_insert_toc", vec![r"^word_get_document_structure$"]),
            ("excel_set_cell_values", vec![r"^excel_(get_used_range|read_range|get_selected_range)$"]),
            ("excel_insert_formula", vec![r"^excel_(get_used_range|read_range|get_selected_range)$"]),
            ("excel_format_range", vec![r"^excel_get_selected_range$"]),
            ("ppt_add_slide", vec![r"^ppt_get_slide_(count|titles)$"]),
            ("ppt_format_text", vec![r"^ppt_get_active_slide$"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
        .collect();

        Self {
            max_entries: 1000,
            default_ttl_ms: 8_000,
            short_ttl_ms: 3_000,
            long_ttl_ms: 15_000,
            short_ttl_keywords: strings(&["selected", "selection", "active"]),
            long_ttl_keywords: strings(&["structure", "count", "names"]),
            ttl_overrides: HashMap::from([
                ("word_get_document_structure".to_string(), 20_000),
                ("excel_get_sheet_names".to_string(), 30_000),
            ]),
            read_patterns: strings(&[r"^(word|excel|ppt)_(get|read|search|list)_"]),
            write_patterns: strings(&[
                r"^(word|excel|ppt)_(apply|format|set|insert|replace|delete|clear|add|accept|sort|create|remove)_",
            ]),
            invalidation_map,
        }
    }
}

// ============================================================================
// Risk Catalog
// ============================================================================

/// Broad class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Read,
    Format,
    Content,
    Structure,
    Mixed,
}

impl Default for OperationType {
    fn default() -> Self {
        OperationType::Mixed
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Read => write!(f, "read"),
            OperationType::Format => write!(f, "format"),
            OperationType::Content => write!(f, "content"),
            OperationType::Structure => write!(f, "structure"),
            OperationType::Mixed => write!(f, "mixed"),
        }
    }
}

/// Static metadata for one operation name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationProfile {
    pub risk_level: RiskLevel,
    pub can_undo: bool,
    pub operation_type: OperationType,
    pub estimated_time_ms: Option<u64>,
    pub affected_scope: Option<String>,
    pub warnings: Vec<String>,
    pub description: Option<String>,
}

impl Default for OperationProfile {
    fn default() -> Self {
        Self {
            risk_level: RiskLevel::Medium,
            can_undo: true,
            operation_type: OperationType::Mixed,
            estimated_time_ms: None,
            affected_scope: None,
            warnings: Vec::new(),
            description: None,
        }
    }
}

impl OperationProfile {
    fn new(risk_level: RiskLevel, can_undo: bool, operation_type: OperationType) -> Self {
        Self {
            risk_level,
            can_undo,
            operation_type,
            ..Default::default()
        }
    }

    fn scope(mut self, scope: &str) -> Self {
        self.affected_scope = Some(scope.to_string());
        self
    }

    fn warn(mut self, warning: &str) -> Self {
        self.warnings.push(warning.to_string());
        self
    }

    fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Default time estimates per operation class, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassEstimates {
    pub read_ms: u64,
    pub format_ms: u64,
    pub content_ms: u64,
    pub structure_ms: u64,
    pub mixed_ms: u64,
}

impl Default for ClassEstimates {
    fn default() -> Self {
        Self {
            read_ms: 500,
            format_ms: 1_500,
            content_ms: 2_000,
            structure_ms: 3_000,
            mixed_ms: 2_000,
        }
    }
}

impl ClassEstimates {
    pub fn for_type(&self, operation_type: OperationType) -> u64 {
        match operation_type {
            OperationType::Read => self.read_ms,
            OperationType::Format => self.format_ms,
            OperationType::Content => self.content_ms,
            OperationType::Structure => self.structure_ms,
            OperationType::Mixed => self.mixed_ms,
        }
    }
}

/// Operation name -> risk/undo/type metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCatalog {
    pub operations: HashMap<String, OperationProfile>,
    pub class_estimates: ClassEstimates,
}

impl RiskCatalog {
    pub fn empty() -> Self {
        Self {
            operations: HashMap::new(),
            class_estimates: ClassEstimates::default(),
        }
    }

    pub fn with_operation(mut self, name: impl Into<String>, profile: OperationProfile) -> Self {
        self.operations.insert(name.into(), profile);
        self
    }
}

impl Default for RiskCatalog {
    fn default() -> Self {
        use OperationType::*;
        use RiskLevel::*;

        let p = OperationProfile::new;
        let operations = [
            // Word
            ("word_get_selected_text", p(Low, true, Read).scope("selection")),
            ("word_get_document_structure", p(Low, true, Read)),
            ("word_get_paragraphs", p(Low, true, Read)),
            ("word_get_style_names", p(Low, true, Read)),
            ("word_search_text", p(Low, true, Read).describe("Find matching text")),
            ("word_apply_style", p(Low, true, Format).describe("Apply a paragraph style")),
            ("word_format_text", p(Low, true, Format).scope("selection")),
            (
                "word_format_paragraph",
                p(Medium, true, Format).warn("Paragraph spacing may shift page layout"),
            ),
            ("word_insert_text", p(Medium, true, Content).scope("cursor")),
            (
                "word_replace_text",
                p(High, true, Content)
                    .describe("Find and replace text")
                    .warn("Replaces every occurrence in the document")
                    .warn("Review the matches before confirming"),
            ),
            (
                "word_delete_text",
                p(High, false, Content).warn("Deleted text is not kept by the copilot"),
            ),
            ("word_delete_empty_paragraphs", p(Medium, true, Structure)),
            ("word_insert_table", p(Medium, true, Structure).scope("cursor")),
            ("word_insert_toc", p(Low, true, Structure).describe("Insert a table of contents")),
            (
                "word_clear_formatting",
                p(High, true, Format).warn("All direct formatting in scope is removed"),
            ),
            (
                "word_accept_all_revisions",
                p(Critical, false, Content).warn("Tracked changes are permanently merged"),
            ),
            ("word_add_comment", p(Low, true, Content)),
            // Excel
            ("excel_get_selected_range", p(Low, true, Read).scope("selection")),
            ("excel_get_sheet_names", p(Low, true, Read).scope("workbook")),
            ("excel_get_used_range", p(Low, true, Read).scope("worksheet")),
            ("excel_read_range", p(Low, true, Read)),
            ("excel_set_cell_values", p(Medium, true, Content).warn("Existing cell values are overwritten")),
            ("excel_insert_formula", p(Medium, true, Content)),
            ("excel_format_range", p(Low, true, Format)),
            ("excel_sort_range", p(Medium, true, Structure).warn("Row order changes")),
            ("excel_create_chart", p(Low, true, Structure)),
            (
                "excel_delete_rows",
                p(High, false, Structure).warn("Formulas referencing deleted rows will break"),
            ),
            (
                "excel_remove_duplicates",
                p(High, false, Content).warn("Duplicate rows are removed permanently"),
            ),
            (
                "excel_delete_sheet",
                p(Critical, false, Structure)
                    .scope("workbook")
                    .warn("The whole worksheet and its data are deleted"),
            ),
            // PowerPoint
            ("ppt_get_active_slide", p(Low, true, Read).scope("slide")),
            ("ppt_get_slide_count", p(Low, true, Read).scope("presentation")),
            ("ppt_get_slide_titles", p(Low, true, Read).scope("presentation")),
            ("ppt_apply_theme", p(Medium, true, Format).scope("presentation")),
            ("ppt_format_text", p(Low, true, Format)),
            ("ppt_add_slide", p(Low, true, Structure)),
            ("ppt_insert_text", p(Medium, true, Content)),
            ("ppt_delete_slide", p(High, false, Structure).warn("Slide content and notes are removed")),
        ]
        .into_iter()
        .map(|(name, profile)| (name.to_string(), profile))
        .collect();

        Self {
            operations,
            class_estimates: ClassEstimates::default(),
        }
    }
}

// ============================================================================
// Clarification
// ============================================================================

/// A canned question asked when a vague request mentions one of `keywords`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationScenario {
    pub id: String,
    pub keywords: Vec<String>,
    pub question: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<ClarificationOption>,
}

/// Request patterns and the ordered scenario list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarificationConfig {
    /// Explicit target + transformation; matching requests never need clarification
    pub direct_patterns: Vec<String>,
    /// Bare verbs without a named target or transformation
    pub vague_patterns: Vec<String>,
    /// Checked in order; first keyword hit wins
    pub scenarios: Vec<ClarificationScenario>,
    /// Asked when no scenario matches
    pub fallback_question: String,
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            direct_patterns: strings(&[
                r"(?i)\b(replace|change|swap)\b.+\b(with|to|into)\b",
                r"(?i)\b(make|set|turn)\b.+\b(bold|italic|underlined?|red|blue|green|black|larger|smaller|\d+\s*(pt|px))\b",
                r"(?i)\b(delete|remove)\b.+\b(paragraphs?|rows?|columns?|slides?|sheets?|empty lines|blank lines)\b",
                r"(?i)\binsert\b.+\b(table|chart|image|text|slide|toc|table of contents)\b",
                r"(?i)\b(apply|use)\b.+\b(style|theme|heading)\b",
            ]),
            vague_patterns: strings(&[
                r"(?i)^\s*(please\s+)?(tidy|clean|fix|improve|polish|optimi[sz]e|beautify|adjust|organi[sz]e)\b(\s+(it|this|that|things|everything))?(\s+up)?\s*[.!]?\s*$",
                r"(?i)^\s*(please\s+)?make\s+(it|this)\s+(better|nicer|prettier|look better|more professional)\s*[.!]?\s*$",
                r"(?i)^\s*(please\s+)?(help|help me|do something)\b.{0,20}$",
                r"(?i)\b(somehow|something like that|whatever works)\b",
            ]),
            scenarios: vec![
                ClarificationScenario {
                    id: "tidy".to_string(),
                    keywords: strings(&["tidy", "clean", "polish", "beautify", "organize", "organise"]),
                    question: "What would you like me to tidy up?".to_string(),
                    question_type: QuestionType::SingleChoice,
                    options: vec![
                        option("format", "Unify formatting of fonts, headings and spacing", &["word_apply_style", "word_format_paragraph"]),
                        option("cleanup", "Remove empty paragraphs and stray spaces", &["word_delete_empty_paragraphs"]),
                        option("structure", "Reorganize headings and add a table of contents", &["word_get_document_structure", "word_insert_toc"]),
                    ],
                },
                ClarificationScenario {
                    id: "improve".to_string(),
                    keywords: strings(&["better", "nicer", "prettier", "professional", "improve", "optimize", "optimise"]),
                    question: "Which aspect should be improved?".to_string(),
                    question_type: QuestionType::MultipleChoice,
                    options: vec![
                        option("format", "Consistent formatting", &["word_apply_style", "word_format_text"]),
                        option("theme", "Apply a presentation theme", &["ppt_apply_theme"]),
                        option("layout", "Paragraph layout and spacing", &["word_format_paragraph"]),
                    ],
                },
                ClarificationScenario {
                    id: "fix".to_string(),
                    keywords: strings(&["fix", "correct", "adjust"]),
                    question: "What needs fixing?".to_string(),
                    question_type: QuestionType::SingleChoice,
                    options: vec![
                        option("spacing", "Spacing and indentation", &["word_format_paragraph"]),
                        option("headings", "Heading levels", &["word_get_document_structure", "word_apply_style"]),
                        option("data", "Cell values in the selected range", &["excel_get_selected_range", "excel_set_cell_values"]),
                    ],
                },
            ],
            fallback_question:
                "Could you describe what you would like to change, and where in the document?"
                    .to_string(),
        }
    }
}

// ============================================================================
// Decomposer
// ============================================================================

/// One step of a plan template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepBlueprint {
    pub description: String,
    pub operation_name: String,
    /// String values may contain `{name}` placeholders filled from the
    /// template pattern's named captures
    #[serde(default)]
    pub args: OperationArgs,
    #[serde(default)]
    pub estimated_time_ms: Option<u64>,
}

/// A multi-step plan recipe selected by keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTemplate {
    pub id: String,
    pub keywords: Vec<String>,
    /// Optional regex that must also match; named groups feed placeholders
    #[serde(default)]
    pub pattern: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepBlueprint>,
}

/// Template library and complexity heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposerConfig {
    /// Checked in order; first match wins
    pub templates: Vec<PlanTemplate>,
    /// Requests longer than this (in chars) are treated as multi-step
    pub complexity_threshold_chars: usize,
    /// Sequencing phrases that suggest several actions
    pub multi_step_markers: Vec<String>,
    pub min_marker_count: usize,
    /// Used for review issues that suggest no operation
    pub review_fallback_operation: String,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            templates: vec![
                PlanTemplate {
                    id: "format".to_string(),
                    keywords: strings(&["formatting", "format the document", "fonts"]),
                    pattern: None,
                    title: "Unify document formatting".to_string(),
                    description: "Normalize heading styles and body paragraph spacing".to_string(),
                    steps: vec![
                        blueprint("Inspect document structure", "word_get_document_structure", json!({})),
                        blueprint("Apply heading styles", "word_apply_style", json!({"style": "Heading 1", "target": "headings"})),
                        blueprint("Normalize body paragraph spacing", "word_format_paragraph", json!({"scope": "body", "lineSpacing": 1.5, "spaceAfter": 6})),
                    ],
                },
                PlanTemplate {
                    id: "replace".to_string(),
                    keywords: strings(&["replace"]),
                    pattern: Some(
                        r#"(?i)replace\s+["'“]?(?P<find>.+?)["'”]?\s+(with|by)\s+["'“]?(?P<replace>.+?)["'”]?\s*[.!]?$"#
                            .to_string(),
                    ),
                    title: "Find and replace".to_string(),
                    description: "Locate every match, then replace it".to_string(),
                    steps: vec![
                        blueprint("Locate \"{find}\"", "word_search_text", json!({"text": "{find}"})),
                        blueprint("Replace \"{find}\" with \"{replace}\"", "word_replace_text", json!({"find": "{find}", "replace": "{replace}", "matchAll": true})),
                    ],
                },
                PlanTemplate {
                    id: "cleanup".to_string(),
                    keywords: strings(&["empty paragraphs", "blank lines", "stray spaces", "clean up"]),
                    pattern: None,
                    title: "Clean up document".to_string(),
                    description: "Remove empty paragraphs and duplicated spaces".to_string(),
                    steps: vec![
                        blueprint("Remove empty paragraphs", "word_delete_empty_paragraphs", json!({})),
                        blueprint("Collapse double spaces", "word_replace_text", json!({"find": "  ", "replace": " ", "matchAll": true})),
                    ],
                },
                PlanTemplate {
                    id: "toc".to_string(),
                    keywords: strings(&["table of contents", "contents page"]),
                    pattern: None,
                    title: "Add a table of contents".to_string(),
                    description: String::new(),
                    steps: vec![
                        blueprint("Inspect heading structure", "word_get_document_structure", json!({})),
                        blueprint("Normalize heading styles", "word_apply_style", json!({"style": "Heading 1", "target": "headings"})),
                        blueprint("Insert the table of contents", "word_insert_toc", json!({"position": "start"})),
                    ],
                },
                PlanTemplate {
                    id: "report".to_string(),
                    keywords: strings(&["summary report", "sales report", "summarize the sheet"]),
                    pattern: None,
                    title: "Build a summary report".to_string(),
                    description: "Read the data, add totals, chart the result".to_string(),
                    steps: vec![
                        blueprint("Read the used range", "excel_get_used_range", json!({})),
                        blueprint("Add total formulas", "excel_insert_formula", json!({"function": "SUM", "placement": "below"})),
                        blueprint("Chart the totals", "excel_create_chart", json!({"chartType": "column"})),
                    ],
                },
                PlanTemplate {
                    id: "deck".to_string(),
                    keywords: strings(&["presentation theme", "slides consistent", "deck"]),
                    pattern: None,
                    title: "Make the deck consistent".to_string(),
                    description: String::new(),
                    steps: vec![
                        blueprint("Collect slide titles", "ppt_get_slide_titles", json!({})),
                        blueprint("Apply the theme", "ppt_apply_theme", json!({"theme": "Office"})),
                        blueprint("Normalize title fonts", "ppt_format_text", json!({"target": "titles", "fontSize": 32})),
                    ],
                },
            ],
            complexity_threshold_chars: 160,
            multi_step_markers: strings(&[" and then ", " then ", " after that ", " also ", "; ", " finally "]),
            min_marker_count: 2,
            review_fallback_operation: "word_add_comment".to_string(),
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Step executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// A failed step at or above this risk stops the run
    pub halt_on_failure_at: RiskLevel,
    /// Max characters per argument value in record-only summaries
    pub summary_value_max_chars: usize,
    /// Undoable results kept per session; the oldest are dropped first
    pub max_undo_history: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            halt_on_failure_at: RiskLevel::High,
            summary_value_max_chars: 40,
            max_undo_history: 50,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn option(id: &str, label: &str, operations: &[&str]) -> ClarificationOption {
    ClarificationOption {
        id: id.to_string(),
        label: label.to_string(),
        recommended_operations: strings(operations),
        risk_level: None,
    }
}

fn blueprint(description: &str, operation_name: &str, args: Value) -> StepBlueprint {
    StepBlueprint {
        description: description.to_string(),
        operation_name: operation_name.to_string(),
        args: match args {
            Value::Object(map) => map,
            _ => OperationArgs::new(),
        },
        estimated_time_ms: None,
    }
}
